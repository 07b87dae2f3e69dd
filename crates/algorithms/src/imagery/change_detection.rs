//! Change detection between two epochs
//!
//! - Differencing: `current - baseline` per pixel
//! - Threshold classification of the change raster into a 0/1 mask

use super::indices::IndexRaster;
use crate::maybe_rayon::*;
use landdelta_core::raster::Raster;
use landdelta_core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-pixel index change; NaN where either epoch is invalid.
pub type ChangeRaster = Raster<f64>;

/// 1 where the change passes the threshold, 0 elsewhere (including
/// invalid pixels).
pub type ChangeMask = Raster<u8>;

/// `current - baseline` per pixel.
///
/// A pixel invalid (NaN) in either epoch is NaN in the result.
/// `difference(a, b) == -difference(b, a)` wherever both are valid.
pub fn difference(current: &IndexRaster, baseline: &IndexRaster) -> Result<ChangeRaster> {
    current.ensure_same_shape(baseline)?;

    let (rows, cols) = current.shape();
    let (vc, vb) = (current.data(), baseline.data());

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            vc.row(row)
                .iter()
                .zip(vb.row(row).iter())
                .map(|(&c, &b)| {
                    if current.is_nodata(c) || baseline.is_nodata(b) {
                        f64::NAN
                    } else {
                        c - b
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    debug_assert_eq!(data.len(), rows * cols);
    current.derive(data, Some(f64::NAN))
}

/// Comparison applied by a [`Threshold`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "gt")]
    GreaterThan,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::LessThan => "<",
            Direction::GreaterThan => ">",
        })
    }
}

/// A signed policy threshold, e.g. `< -0.2` for vegetation loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    pub direction: Direction,
}

impl Threshold {
    pub fn less_than(value: f64) -> Self {
        Self {
            value,
            direction: Direction::LessThan,
        }
    }

    pub fn greater_than(value: f64) -> Self {
        Self {
            value,
            direction: Direction::GreaterThan,
        }
    }

    /// Strict comparison; NaN never passes.
    pub fn test(&self, v: f64) -> bool {
        match self.direction {
            Direction::LessThan => v < self.value,
            Direction::GreaterThan => v > self.value,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction, self.value)
    }
}

/// Boolean change mask from a change raster.
pub fn classify(change: &ChangeRaster, threshold: Threshold) -> Result<ChangeMask> {
    let (rows, cols) = change.shape();
    let view = change.data();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            view.row(row)
                .iter()
                .map(|&v| u8::from(!change.is_nodata(v) && threshold.test(v)))
                .collect::<Vec<_>>()
        })
        .collect();

    debug_assert_eq!(data.len(), rows * cols);
    change.derive(data, None)
}
