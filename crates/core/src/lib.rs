//! # LandDelta Core
//!
//! Core types and I/O for multi-temporal land-cover change detection.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced 2D grid with NaN/no-data aware statistics
//! - `GeoTransform` and `CRS`: georeferencing
//! - `SceneImage` / `ImageSequence`: multi-band reflectance scenes with a
//!   bit-encoded quality band, filterable by date, cloud cover and bounds
//! - `Region`: the polygon area of interest
//! - `SceneSource`: the data-source seam, with in-memory and catalog backends
//! - Native GeoTIFF reading and writing

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;
pub mod scene;
pub mod source;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use region::Region;
pub use scene::{Band, DateRange, ImageSequence, SceneImage};
pub use source::{CatalogSource, MemorySource, SceneSource};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::region::Region;
    pub use crate::scene::{Band, DateRange, ImageSequence, SceneImage};
    pub use crate::source::SceneSource;
}
