//! Region-level reductions
//!
//! - **pixel_area**: planar and ellipsoidal cell areas
//! - **zonal**: sampling grids, area totals, spatial means, clipping and
//!   resampling

pub mod pixel_area;
pub mod zonal;

pub use pixel_area::{cell_dimensions, metres_per_degree, AreaModel, CellDimensions, SpheroidalParams};
pub use zonal::{
    aggregate_area, clip_to_region, resample_nearest, spatial_mean, SamplingGrid, ZonalSampling,
};
