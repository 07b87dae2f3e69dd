//! Annual index time series
//!
//! For each calendar year the index is composited over the year's scenes
//! and reduced to one spatial mean over the region.

use crate::imagery::{temporal_composite, SceneIndex};
use crate::statistics::{spatial_mean, SamplingGrid, ZonalSampling};
use landdelta_core::region::Region;
use landdelta_core::scene::{DateRange, ImageSequence};
use landdelta_core::{Error, Result};
use landdelta_parallel::{ParallelStrategy, ProcessingMode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One year of the series; `value` is `None` when the year had no valid pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: Option<f64>,
    /// Scenes that entered the year's composite
    pub image_count: usize,
}

/// Year-ordered spatial means of one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSeries {
    pub index: String,
    pub entries: Vec<YearValue>,
}

impl YearSeries {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries.iter().map(|e| e.year)
    }

    pub fn missing_years(&self) -> Vec<i32> {
        self.entries
            .iter()
            .filter(|e| e.value.is_none())
            .map(|e| e.year)
            .collect()
    }

    pub fn get(&self, year: i32) -> Option<&YearValue> {
        self.entries.iter().find(|e| e.year == year)
    }
}

/// Spatial mean of the yearly composite of `index`, for every year in
/// `year_start..=year_end`.
///
/// The result has exactly one entry per year, in ascending order. Years are
/// processed with `mode`; scenes within a year always use the global pool.
/// The sampling cap is checked once, before any compositing.
pub fn year_series<I: SceneIndex + ?Sized>(
    sequence: &ImageSequence,
    year_start: i32,
    year_end: i32,
    index: &I,
    region: &Region,
    sampling: &ZonalSampling,
    mode: ProcessingMode,
) -> Result<YearSeries> {
    if year_start > year_end {
        return Err(Error::InvalidDateRange {
            start: year_start.to_string(),
            end: year_end.to_string(),
        });
    }
    SamplingGrid::for_region(region, sampling.resolution_m)?.check_cap(sampling.max_pixels)?;

    let years: Vec<i32> = (year_start..=year_end).collect();
    let entries = mode
        .map_items(years, |year| -> Result<YearValue> {
            let range = DateRange::calendar_year(year)?;
            let composite = temporal_composite(sequence, &range, index, region, ProcessingMode::Parallel)?;
            let (value, image_count) = match composite {
                Some(c) => (spatial_mean(&c.raster, region, sampling)?, c.image_count),
                None => (None, 0),
            };
            if value.is_none() {
                warn!("{} {}: no valid pixels, year is missing", index.name(), year);
            }
            Ok(YearValue {
                year,
                value,
                image_count,
            })
        })
        .map_err(|e| Error::Algorithm(e.to_string()))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let series = YearSeries {
        index: index.name().to_string(),
        entries,
    };
    info!(
        "{} series {}..{}: {} years, {} missing",
        series.index,
        year_start,
        year_end,
        series.len(),
        series.missing_years().len()
    );
    Ok(series)
}
