//! Error types for LandDelta

use thiserror::Error;

/// Main error type for LandDelta operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unknown band name: {0}")]
    UnknownBand(String),

    #[error("Band {band} not present in scene {scene}")]
    MissingBand { band: String, scene: String },

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error(
        "Aggregation needs an estimated {estimated} pixels, above the cap of {max_pixels}; \
         coarsen the resolution or simplify the region"
    )]
    ResourceExceeded { estimated: u64, max_pixels: u64 },

    #[error("Scene catalog error: {0}")]
    Catalog(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Catalog(e.to_string())
    }
}

/// Result type alias for LandDelta operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exceeded_message_has_guidance() {
        let e = Error::ResourceExceeded {
            estimated: 120,
            max_pixels: 100,
        };
        let msg = e.to_string();
        assert!(msg.contains("120"));
        assert!(msg.contains("coarsen the resolution"));
    }
}
