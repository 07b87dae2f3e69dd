//! A single multi-band acquisition

use super::Band;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One acquisition: reflectance bands plus a bit-encoded quality band on a
/// shared grid.
///
/// Band rasters are reference counted, so attaching a validity mask produces
/// a new scene without copying reflectance data. Pixels where the validity
/// mask is 0 are excluded from every downstream reduction.
#[derive(Debug, Clone)]
pub struct SceneImage {
    id: String,
    acquired: NaiveDate,
    cloud_cover: f64,
    bands: BTreeMap<Band, Arc<Raster<f64>>>,
    quality: Arc<Raster<u16>>,
    validity: Option<Arc<Raster<u8>>>,
}

impl SceneImage {
    /// Create a scene from its quality band; reflectance bands are added with
    /// [`SceneImage::with_band`].
    pub fn new(
        id: impl Into<String>,
        acquired: NaiveDate,
        cloud_cover: f64,
        quality: Raster<u16>,
    ) -> Self {
        Self {
            id: id.into(),
            acquired,
            cloud_cover,
            bands: BTreeMap::new(),
            quality: Arc::new(quality),
            validity: None,
        }
    }

    /// Add a reflectance band; it must share the quality band's shape.
    pub fn with_band(mut self, band: Band, raster: Raster<f64>) -> Result<Self> {
        self.quality.ensure_same_shape(&raster)?;
        self.bands.insert(band, Arc::new(raster));
        Ok(self)
    }

    /// Copy of this scene carrying `mask` (1 = valid, 0 = excluded).
    pub fn with_validity(&self, mask: Raster<u8>) -> Result<Self> {
        self.quality.ensure_same_shape(&mask)?;
        Ok(Self {
            validity: Some(Arc::new(mask)),
            ..self.clone()
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquisition date
    pub fn timestamp(&self) -> NaiveDate {
        self.acquired
    }

    /// Scene-level cloud cover in percent
    pub fn cloud_cover(&self) -> f64 {
        self.cloud_cover
    }

    /// Reflectance raster for `band`
    pub fn band(&self, band: Band) -> Result<&Raster<f64>> {
        self.bands
            .get(&band)
            .map(|r| r.as_ref())
            .ok_or_else(|| Error::MissingBand {
                band: band.to_string(),
                scene: self.id.clone(),
            })
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn band_names(&self) -> impl Iterator<Item = Band> + '_ {
        self.bands.keys().copied()
    }

    /// Bit-encoded per-pixel quality flags
    pub fn quality_bits(&self) -> &Raster<u16> {
        &self.quality
    }

    pub fn validity(&self) -> Option<&Raster<u8>> {
        self.validity.as_deref()
    }

    /// Whether (row, col) survives the validity mask; scenes without a mask
    /// are valid everywhere.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        match &self.validity {
            Some(mask) => mask.data().get((row, col)).map_or(false, |&v| v != 0),
            None => true,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.quality.shape()
    }

    pub fn transform(&self) -> &GeoTransform {
        self.quality.transform()
    }

    /// Footprint bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.quality.bounds()
    }
}
