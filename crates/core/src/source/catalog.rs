//! JSON scene catalog backed by per-band GeoTIFF files
//!
//! ```json
//! {
//!   "scenes": [
//!     {
//!       "id": "LC08_148041_20140305",
//!       "date": "2014-03-05",
//!       "cloud_cover": 3.1,
//!       "bands": { "SR_B4": "2014/B4.tif", "SR_B5": "2014/B5.tif" },
//!       "quality": "2014/QA_PIXEL.tif",
//!       "scale": 0.0000275,
//!       "offset": -0.2
//!     }
//!   ]
//! }
//! ```
//!
//! Relative paths resolve against the catalog file's directory.

use super::SceneSource;
use crate::error::{Error, Result};
use crate::io::read_geotiff;
use crate::raster::Raster;
use crate::region::Region;
use crate::scene::{Band, DateRange, ImageSequence, SceneImage};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn unit_scale() -> f64 {
    1.0
}

/// One scene in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub date: NaiveDate,
    pub cloud_cover: f64,
    pub bands: BTreeMap<Band, PathBuf>,
    pub quality: PathBuf,
    /// Multiplier applied to stored band values
    #[serde(default = "unit_scale")]
    pub scale: f64,
    /// Added to stored band values after scaling
    #[serde(default)]
    pub offset: f64,
}

/// The catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneCatalog {
    pub scenes: Vec<CatalogEntry>,
}

/// A [`SceneSource`] reading scenes listed in a [`SceneCatalog`].
///
/// Date and cloud filters run on catalog metadata, so only matching scenes
/// are read from disk; the bounds filter runs on the loaded footprints.
#[derive(Debug, Clone)]
pub struct CatalogSource {
    catalog: SceneCatalog,
    root: PathBuf,
}

impl CatalogSource {
    /// Load a catalog file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let catalog: SceneCatalog = serde_json::from_str(&text)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(catalog, root))
    }

    pub fn new(catalog: SceneCatalog, root: PathBuf) -> Self {
        Self { catalog, root }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.catalog.scenes
    }

    /// Catalog entries passing the date and cloud-cover filters
    pub fn matching(&self, range: &DateRange, max_cloud_percent: f64) -> Vec<&CatalogEntry> {
        self.catalog
            .scenes
            .iter()
            .filter(|e| range.contains(e.date) && e.cloud_cover < max_cloud_percent)
            .collect()
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Read every raster of one entry into a scene
    pub fn load(&self, entry: &CatalogEntry) -> Result<SceneImage> {
        if entry.bands.is_empty() {
            return Err(Error::Catalog(format!("scene {} lists no bands", entry.id)));
        }
        let quality: Raster<u16> = read_geotiff(self.resolve(&entry.quality))?;
        let mut scene = SceneImage::new(entry.id.clone(), entry.date, entry.cloud_cover, quality);

        for (&band, path) in &entry.bands {
            let mut raster: Raster<f64> = read_geotiff(self.resolve(path))?;
            let nodata = raster.nodata();
            raster.data_mut().mapv_inplace(|v| {
                let stored_nodata = nodata.map_or(false, |nd| v == nd);
                if v.is_nan() || stored_nodata {
                    f64::NAN
                } else {
                    v * entry.scale + entry.offset
                }
            });
            raster.set_nodata(Some(f64::NAN));
            scene = scene.with_band(band, raster)?;
        }
        Ok(scene)
    }
}

impl SceneSource for CatalogSource {
    fn query_images(
        &self,
        region: &Region,
        range: &DateRange,
        max_cloud_percent: f64,
    ) -> Result<ImageSequence> {
        let entries = self.matching(range, max_cloud_percent);
        debug!("Catalog: {} scenes match {} below {}% cloud", entries.len(), range, max_cloud_percent);

        let scenes = entries
            .into_iter()
            .map(|e| self.load(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(ImageSequence::new(scenes).filter_bounds(region.bbox()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::io::write_geotiff;
    use crate::raster::GeoTransform;

    fn write(dir: &Path, name: &str, value: f64) {
        let mut r: Raster<f64> = Raster::filled(4, 4, value);
        r.set_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        write_geotiff(&r, dir.join(name), None).unwrap();
    }

    #[test]
    fn test_catalog_loads_scaled_bands() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b4.tif", 10000.0);
        write(dir.path(), "b5.tif", 20000.0);
        write(dir.path(), "qa.tif", 0.0);

        let doc = r#"{
            "scenes": [
                {"id": "s1", "date": "2014-03-05", "cloud_cover": 3.0,
                 "bands": {"SR_B4": "b4.tif", "nir": "b5.tif"},
                 "quality": "qa.tif", "scale": 0.0000275, "offset": -0.2},
                {"id": "s2", "date": "2014-04-05", "cloud_cover": 60.0,
                 "bands": {"SR_B4": "b4.tif"}, "quality": "qa.tif"}
            ]
        }"#;
        let path = dir.path().join("catalog.json");
        fs::write(&path, doc).unwrap();

        let src = CatalogSource::open(&path).unwrap();
        assert_eq!(src.entries().len(), 2);

        let region = Region::from_bbox(0.0, 0.0, 40.0, 40.0, CRS::utm(43, true)).unwrap();
        let seq = src
            .query_images(&region, &DateRange::calendar_year(2014).unwrap(), 20.0)
            .unwrap();
        assert_eq!(seq.len(), 1);

        let scene = &seq.scenes()[0];
        let red = scene.band(Band::Red).unwrap().get(0, 0).unwrap();
        let nir = scene.band(Band::Nir).unwrap().get(0, 0).unwrap();
        assert!((red - (10000.0 * 0.0000275 - 0.2)).abs() < 1e-9);
        assert!((nir - (20000.0 * 0.0000275 - 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_band_in_catalog_rejected() {
        let doc = r#"{"scenes": [{"id": "s", "date": "2014-01-01", "cloud_cover": 1.0,
            "bands": {"SR_B11": "x.tif"}, "quality": "qa.tif"}]}"#;
        assert!(serde_json::from_str::<SceneCatalog>(doc).is_err());
    }
}
