//! # LandDelta Algorithms
//!
//! The change-detection and aggregation pipeline over multi-temporal
//! reflectance scenes.
//!
//! ## Modules
//!
//! - **imagery**: quality masking, normalized-difference indices, median
//!   compositing, change differencing and threshold classification
//! - **statistics**: pixel area, sampling grids, area totals and spatial means
//! - **vector**: region simplification
//! - **temporal**: yearly index series
//! - **pipeline**: configuration and the end-to-end change and series branches

pub mod imagery;
pub mod pipeline;
pub mod statistics;
pub mod temporal;
pub mod vector;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        classify, difference, mask_scene, mask_sequence, median_composite, normalized_difference,
        temporal_composite, ChangeMask, ChangeRaster, Composite, Direction, IndexKind,
        IndexRaster, QualityBits, SceneIndex, SpectralIndex, Threshold,
    };
    pub use crate::pipeline::{
        compute_change_product, compute_year_series, run_change_branch, AreaResult,
        ChangeProduct, ChangeReport, PipelineConfig,
    };
    pub use crate::statistics::{aggregate_area, spatial_mean, AreaModel, SamplingGrid, ZonalSampling};
    pub use crate::temporal::{year_series, YearSeries, YearValue};
    pub use crate::vector::simplify_region;
    pub use landdelta_core::prelude::*;
}
