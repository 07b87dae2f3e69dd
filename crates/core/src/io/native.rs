//! Native GeoTIFF reading/writing (no GDAL dependency)
//!
//! Uses the `tiff` crate. Georeferencing is carried by ModelPixelScale and
//! ModelTiepoint; the no-data marker by the GDAL_NODATA ASCII tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Write the GDAL_NODATA tag ("nan") so readers treat NaN as no-data
    pub write_nodata_tag: bool,
    /// GTModelTypeGeoKey: 1 = projected, 2 = geographic
    pub model_type: u16,
    /// EPSG code written as GeographicTypeGeoKey (geographic model) or
    /// ProjectedCSTypeGeoKey (projected model)
    pub epsg: Option<u16>,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            write_nodata_tag: true,
            model_type: 1,
            epsg: None,
        }
    }
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: &[S]) -> Vec<T> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<T> = match decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?
    {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-sample images decode interleaved; only the first band is kept.
    let samples = data.len() / (rows * cols).max(1);
    let data = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    if let Some(code) = read_epsg(&mut decoder) {
        raster.set_crs(Some(CRS::from_epsg(code)));
    }
    if let Ok(text) = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)) {
        let parsed = text.trim_end_matches('\0').trim().parse::<f64>().ok();
        raster.set_nodata(parsed.and_then(num_traits::cast));
    }
    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE)).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT)).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKeyDirectory, if one is stored inline
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)).ok()?;
    // header: [version, revision, minor, count], then 4 shorts per key
    let count = *keys.get(3)? as usize;
    keys.get(4..4 + count * 4)?
        .chunks_exact(4)
        .find(|k| (k[0] == GEOGRAPHIC_TYPE_KEY || k[0] == PROJECTED_CS_TYPE_KEY) && k[1] == 0)
        .map(|k| k[3] as u32)
}

fn geo_keys(options: &GeoTiffOptions) -> Vec<u16> {
    // Version 1.1.0; raster type is PixelIsArea
    let mut keys = vec![
        GT_MODEL_TYPE_KEY, 0, 1, options.model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1,
    ];
    if let Some(code) = options.epsg {
        let key = if options.model_type == 2 {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend([key, 0, 1, code]);
    }
    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

/// Write a Raster to a GeoTIFF file as 32-bit float
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file), &options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T: RasterElement>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{}: {}", what, e));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let geokeys = geo_keys(options);
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    if options.write_nodata_tag {
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), "nan")
            .map_err(|e| tiff_err("Cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_buffer_keeps_georeference_and_nan() {
        let mut r: Raster<f64> = Raster::filled(3, 4, 0.25);
        r.set(1, 2, f64::NAN).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 3_000_000.0, 30.0, -30.0));

        let bytes = write_geotiff_to_buffer(&r, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert!(back.get(1, 2).unwrap().is_nan());
        assert_relative_eq!(back.get(0, 0).unwrap(), 0.25, epsilon = 1e-6);
        assert_relative_eq!(back.transform().origin_x, 500_000.0);
        assert_relative_eq!(back.transform().pixel_height, -30.0);
    }

    #[test]
    fn test_epsg_written_and_read_back() {
        let mut r: Raster<f64> = Raster::filled(2, 2, 0.1);
        r.set_transform(GeoTransform::new(500_000.0, 3_000_000.0, 30.0, -30.0));
        let options = GeoTiffOptions {
            epsg: Some(32643),
            ..GeoTiffOptions::default()
        };
        let bytes = write_geotiff_to_buffer(&r, Some(options)).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(back.crs(), Some(&CRS::utm(43, true)));

        let options = GeoTiffOptions {
            model_type: 2,
            epsg: Some(4326),
            ..GeoTiffOptions::default()
        };
        let keys = geo_keys(&options);
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[12..], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);

        let bytes = write_geotiff_to_buffer(&r, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
        assert!(back.crs().is_none());
    }

    #[test]
    fn test_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.tif");
        let mask: Raster<u8> = Raster::filled(2, 2, 1);
        write_geotiff(&mask, &path, None).unwrap();

        let back: Raster<u8> = read_geotiff(&path).unwrap();
        assert_eq!(back.get(1, 1).unwrap(), 1);
    }
}
