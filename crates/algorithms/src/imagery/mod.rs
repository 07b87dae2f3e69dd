//! Imagery analysis algorithms
//!
//! The per-pixel stages of change detection:
//! - Quality masking from a bit-encoded QA band
//! - Normalized-difference indices (NDVI, NDBI)
//! - Temporal median compositing
//! - Change differencing and threshold classification

mod change_detection;
mod composite;
mod indices;
mod quality_mask;

pub use change_detection::{classify, difference, ChangeMask, ChangeRaster, Direction, Threshold};
pub use composite::{median_composite, temporal_composite, Composite};
pub use indices::{
    normalized_difference, BandPair, IndexKind, IndexRaster, SceneIndex, SpectralIndex,
};
pub use quality_mask::{mask_scene, mask_sequence, quality_mask, QualityBits};
