//! Quality-band masking
//!
//! Derives a per-pixel validity mask from a bit-encoded quality band
//! (e.g. Landsat Collection 2 `QA_PIXEL`) and attaches it to the scene.
//! Band values are never modified.

use crate::maybe_rayon::*;
use landdelta_core::raster::Raster;
use landdelta_core::scene::{ImageSequence, SceneImage};
use landdelta_core::{Error, Result};
use landdelta_parallel::{ParallelStrategy, ProcessingMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Bit positions of the quality band that disqualify a pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct QualityBits {
    bits: Vec<u8>,
    flags: u16,
}

impl QualityBits {
    pub fn new(bits: impl IntoIterator<Item = u8>) -> Result<Self> {
        let mut bits: Vec<u8> = bits.into_iter().collect();
        if let Some(&bad) = bits.iter().find(|&&b| b >= 16) {
            return Err(Error::InvalidParameter {
                name: "quality_bits",
                value: bad.to_string(),
                reason: "quality band is 16 bits wide".into(),
            });
        }
        bits.sort_unstable();
        bits.dedup();
        let flags = bits.iter().fold(0_u16, |acc, &b| acc | (1 << b));
        Ok(Self { bits, flags })
    }

    /// Landsat QA_PIXEL bits 3 and 5
    pub fn landsat_default() -> Self {
        Self {
            bits: vec![3, 5],
            flags: (1 << 3) | (1 << 5),
        }
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    /// True when none of the disqualifying bits is set
    pub fn is_clear(&self, qa: u16) -> bool {
        qa & self.flags == 0
    }
}

impl Default for QualityBits {
    fn default() -> Self {
        Self::landsat_default()
    }
}

impl TryFrom<Vec<u8>> for QualityBits {
    type Error = Error;

    fn try_from(bits: Vec<u8>) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<QualityBits> for Vec<u8> {
    fn from(q: QualityBits) -> Self {
        q.bits
    }
}

/// Validity mask (1 = clear, 0 = disqualified) from a quality band.
///
/// Cells equal to the band's declared no-data value are disqualified.
pub fn quality_mask(qa: &Raster<u16>, bits: &QualityBits) -> Result<Raster<u8>> {
    let (rows, cols) = qa.shape();
    let view = qa.data();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            view.row(row)
                .iter()
                .map(|&v| u8::from(!qa.is_nodata(v) && bits.is_clear(v)))
                .collect::<Vec<_>>()
        })
        .collect();

    debug_assert_eq!(data.len(), rows * cols);
    qa.derive(data, None)
}

/// The scene with its validity mask ANDed with the quality mask.
///
/// Applying the same bits twice yields the same mask.
pub fn mask_scene(scene: &SceneImage, bits: &QualityBits) -> Result<SceneImage> {
    let mut mask = quality_mask(scene.quality_bits(), bits)?;
    if let Some(existing) = scene.validity() {
        ndarray::Zip::from(mask.data_mut())
            .and(existing.data())
            .for_each(|m, &e| *m &= u8::from(e != 0));
    }
    scene.with_validity(mask)
}

/// Mask every scene of a sequence independently.
pub fn mask_sequence(
    sequence: &ImageSequence,
    bits: &QualityBits,
    mode: ProcessingMode,
) -> Result<ImageSequence> {
    let scenes: Vec<Arc<SceneImage>> = sequence.scenes().to_vec();
    let masked = mode
        .map_items(scenes, |s| mask_scene(&s, bits).map(Arc::new))
        .map_err(|e| Error::Algorithm(e.to_string()))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    debug!("Quality-masked {} scenes (bits {:?})", masked.len(), bits.bits());
    Ok(ImageSequence::from_shared(masked))
}
