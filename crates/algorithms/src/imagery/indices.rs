//! Normalized-difference spectral indices
//!
//! Both indices used for change detection are normalized differences of two
//! reflectance bands and differ only in band selection:
//! - NDVI (vegetation): `(NIR - Red) / (NIR + Red)`
//! - NDBI (built-up): `(SWIR1 - NIR) / (SWIR1 + NIR)`

use crate::maybe_rayon::*;
use landdelta_core::raster::Raster;
use landdelta_core::scene::{Band, SceneImage};
use landdelta_core::Result;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single-band index raster; NaN marks invalid pixels.
pub type IndexRaster = Raster<f64>;

/// The two index families the pipeline tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Built-up Index
    Ndbi,
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Ndvi => "NDVI",
            IndexKind::Ndbi => "NDBI",
        }
    }

    /// Conventional band pair for Landsat 8/9
    pub fn default_bands(&self) -> BandPair {
        match self {
            IndexKind::Ndvi => BandPair::new(Band::Nir, Band::Red),
            IndexKind::Ndbi => BandPair::new(Band::Swir1, Band::Nir),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered band pair `(A, B)` of `(A - B) / (A + B)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPair {
    pub positive: Band,
    pub negative: Band,
}

impl BandPair {
    pub fn new(positive: Band, negative: Band) -> Self {
        Self { positive, negative }
    }

    pub fn swapped(&self) -> Self {
        Self::new(self.negative, self.positive)
    }
}

/// Anything that turns one scene into one index raster.
pub trait SceneIndex: Sync {
    fn name(&self) -> &str;

    fn compute(&self, scene: &SceneImage) -> Result<IndexRaster>;
}

/// A normalized-difference index over a configured band pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralIndex {
    pub kind: IndexKind,
    pub bands: BandPair,
}

impl SpectralIndex {
    pub fn new(kind: IndexKind, bands: BandPair) -> Self {
        Self { kind, bands }
    }

    /// NDVI with NIR/Red
    pub fn ndvi() -> Self {
        Self::new(IndexKind::Ndvi, IndexKind::Ndvi.default_bands())
    }

    /// NDBI with SWIR1/NIR
    pub fn ndbi() -> Self {
        Self::new(IndexKind::Ndbi, IndexKind::Ndbi.default_bands())
    }
}

impl SceneIndex for SpectralIndex {
    fn name(&self) -> &str {
        self.kind.name()
    }

    /// Normalized difference of the pair, with pixels outside the scene's
    /// validity mask set to NaN.
    fn compute(&self, scene: &SceneImage) -> Result<IndexRaster> {
        let a = scene.band(self.bands.positive)?;
        let b = scene.band(self.bands.negative)?;
        let mut index = normalized_difference(a, b)?;

        if let Some(mask) = scene.validity() {
            Zip::from(index.data_mut())
                .and(mask.data())
                .for_each(|v, &m| {
                    if m == 0 {
                        *v = f64::NAN;
                    }
                });
        }
        Ok(index)
    }
}

/// `(band_a - band_b) / (band_a + band_b)` per pixel.
///
/// Pixels where either band is no-data or negative, or where
/// `band_a + band_b == 0`, are NaN. Every valid result lies in [-1, 1].
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<IndexRaster> {
    band_a.ensure_same_shape(band_b)?;

    let (rows, cols) = band_a.shape();
    let (va, vb) = (band_a.data(), band_b.data());

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let (ra, rb) = (va.row(row), vb.row(row));
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let (a, b) = (ra[col], rb[col]);
                if band_a.is_nodata(a) || band_b.is_nodata(b) {
                    continue;
                }
                // Surface-reflectance offsets can push dark pixels below zero
                if a < 0.0 || b < 0.0 {
                    continue;
                }
                let sum = a + b;
                if sum == 0.0 {
                    continue;
                }
                row_data[col] = (a - b) / sum;
            }
            row_data
        })
        .collect();

    band_a.derive(data, Some(f64::NAN))
}
