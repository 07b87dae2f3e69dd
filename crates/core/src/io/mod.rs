//! I/O operations for reading and writing rasters

mod native;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    GeoTiffOptions,
};

use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk raster format for exported products
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    GeoTiff,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::GeoTiff => "tif",
        }
    }
}

/// Write `raster` to `path` in `format`.
///
/// The GeoTIFF model type follows the raster's CRS (geographic when it is
/// lon/lat, projected otherwise), and its EPSG code is stored when known.
pub fn write_raster<T, P>(raster: &Raster<T>, path: P, format: RasterFormat) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    match format {
        RasterFormat::GeoTiff => {
            let geographic = raster.crs().is_some_and(|c| c.is_geographic());
            let options = GeoTiffOptions {
                model_type: if geographic { 2 } else { 1 },
                epsg: raster
                    .crs()
                    .and_then(|c| c.epsg())
                    .and_then(|code| u16::try_from(code).ok()),
                ..GeoTiffOptions::default()
            };
            write_geotiff(raster, path, Some(options))
        }
    }
}
