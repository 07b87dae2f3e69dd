//! Temporal median compositing
//!
//! Reduces the index rasters of all scenes in a date range to one raster by
//! a per-pixel median over valid observations. The median is preferred over
//! the mean because residual cloud and shadow the quality mask missed shows
//! up as outliers.

use super::indices::{IndexRaster, SceneIndex};
use crate::maybe_rayon::*;
use crate::statistics::clip_to_region;
use landdelta_core::region::Region;
use landdelta_core::scene::{DateRange, ImageSequence};
use landdelta_core::{Error, Result};
use landdelta_parallel::{ParallelStrategy, ProcessingMode};
use tracing::{debug, warn};

/// A composite index raster for one date range
#[derive(Debug, Clone)]
pub struct Composite {
    pub range: DateRange,
    /// Number of scenes that entered the median
    pub image_count: usize,
    pub raster: IndexRaster,
}

/// Per-pixel median of a stack of equally shaped rasters, skipping NaN.
///
/// A pixel with no valid observation stays NaN. Returns `None` for an empty
/// stack.
pub fn median_composite(stack: &[IndexRaster]) -> Result<Option<IndexRaster>> {
    let Some(first) = stack.first() else {
        return Ok(None);
    };
    for r in &stack[1..] {
        first.ensure_same_shape(r)?;
    }

    let (rows, cols) = first.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut values = Vec::with_capacity(stack.len());
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();
                values.extend(
                    stack
                        .iter()
                        .map(|r| r.data()[(row, col)])
                        .filter(|v| !v.is_nan()),
                );
                *out = median_in_place(&mut values);
            }
            row_data
        })
        .collect();

    first.derive(data, Some(f64::NAN)).map(Some)
}

/// Median of the slice (mean of the two middle values for even lengths);
/// NaN when empty.
fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Composite of `index` over the scenes of `sequence` inside `range`,
/// clipped to `region`.
///
/// The sequence is expected to be quality-masked already. Returns
/// `Ok(None)` when no scene falls in the range: an empty epoch is a missing
/// value, not an error.
pub fn temporal_composite<I: SceneIndex + ?Sized>(
    sequence: &ImageSequence,
    range: &DateRange,
    index: &I,
    region: &Region,
    mode: ProcessingMode,
) -> Result<Option<Composite>> {
    let epoch = sequence.filter_date(range);
    if epoch.is_empty() {
        warn!("No scenes for {} in {}; composite is missing", index.name(), range);
        return Ok(None);
    }

    let stack = mode
        .map_items(epoch.scenes().to_vec(), |scene| index.compute(&scene))
        .map_err(|e| Error::Algorithm(e.to_string()))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let Some(median) = median_composite(&stack)? else {
        return Ok(None);
    };
    let raster = clip_to_region(&median, region);
    debug!(
        "{} composite {}: {} scenes, {} valid pixels",
        index.name(),
        range,
        stack.len(),
        raster.valid_count()
    );

    Ok(Some(Composite {
        range: *range,
        image_count: stack.len(),
        raster,
    }))
}
