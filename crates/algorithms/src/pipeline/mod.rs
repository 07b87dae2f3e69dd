//! End-to-end change detection
//!
//! Two independent branches share the configuration and the scene source:
//! - **change**: query and quality-mask both epochs, composite each index,
//!   difference, classify and aggregate the masks to km²
//! - **series**: query the whole series span once and reduce each year's
//!   composite to a spatial mean

mod config;
mod export;

pub use config::{
    mask_label, AggregationConfig, ExportConfig, IndexBands, PipelineConfig, RegionConfig,
    SeriesConfig,
};
pub use export::{export_change_report, ExportedRaster};

use crate::imagery::{
    classify, difference, mask_sequence, temporal_composite, ChangeMask, ChangeRaster, Composite,
    IndexKind, SpectralIndex, Threshold,
};
use crate::statistics::{aggregate_area, SamplingGrid};
use crate::temporal::{year_series, YearSeries};
use landdelta_core::region::Region;
use landdelta_core::scene::{DateRange, ImageSequence};
use landdelta_core::source::SceneSource;
use landdelta_core::{Error, Result};
use landdelta_parallel::{ParallelStrategy, ProcessingMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Baseline and current composites of one index and their difference
#[derive(Debug, Clone)]
pub struct ChangeProduct {
    pub index: IndexKind,
    pub baseline: Composite,
    pub current: Composite,
    pub change: ChangeRaster,
}

/// Area in km² per mask label; `None` when the mask could not be built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaResult {
    pub km2: BTreeMap<String, Option<f64>>,
}

impl AreaResult {
    pub fn insert(&mut self, label: impl Into<String>, km2: Option<f64>) {
        self.km2.insert(label.into(), km2);
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.km2.get(label).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.km2.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of the change branch for one index
#[derive(Debug, Clone)]
pub struct IndexChange {
    pub index: IndexKind,
    pub label: &'static str,
    pub threshold: Threshold,
    /// `None` when either epoch had no scenes
    pub product: Option<ChangeProduct>,
    pub mask: Option<ChangeMask>,
    pub area_km2: Option<f64>,
}

/// Everything the change branch produced
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub changes: Vec<IndexChange>,
    pub areas: AreaResult,
    /// Region the areas were summed over
    pub aggregation_region: Region,
}

impl ChangeReport {
    pub fn get(&self, index: IndexKind) -> Option<&IndexChange> {
        self.changes.iter().find(|c| c.index == index)
    }
}

fn parallel_err(e: landdelta_parallel::ParallelError) -> Error {
    Error::Algorithm(e.to_string())
}

/// Query `range` and quality-mask the result
fn query_masked(
    source: &dyn SceneSource,
    config: &PipelineConfig,
    region: &Region,
    range: &DateRange,
    mode: ProcessingMode,
) -> Result<ImageSequence> {
    let scenes = source.query_images(region, range, config.max_cloud_percent)?;
    info!(
        "{} scenes in {} below {}% cloud cover",
        scenes.len(),
        range,
        config.max_cloud_percent
    );
    mask_sequence(&scenes, &config.quality_bits, mode)
}

/// Composite both epochs with `index` and difference them.
fn change_from_epochs(
    baseline: &ImageSequence,
    current: &ImageSequence,
    config: &PipelineConfig,
    index: &SpectralIndex,
    region: &Region,
    mode: ProcessingMode,
) -> Result<Option<ChangeProduct>> {
    let (before, after) = mode
        .join(
            || temporal_composite(baseline, &config.baseline, index, region, ProcessingMode::Parallel),
            || temporal_composite(current, &config.current, index, region, ProcessingMode::Parallel),
        )
        .map_err(parallel_err)?;

    match (before?, after?) {
        (Some(baseline), Some(current)) => {
            let change = difference(&current.raster, &baseline.raster)?;
            Ok(Some(ChangeProduct {
                index: index.kind,
                baseline,
                current,
                change,
            }))
        }
        (before, after) => {
            warn!(
                "{} change skipped: baseline {} scenes, current {} scenes",
                index.kind,
                before.map_or(0, |c| c.image_count),
                after.map_or(0, |c| c.image_count)
            );
            Ok(None)
        }
    }
}

/// Baseline and current composites of `kind` and their change raster.
///
/// `Ok(None)` when either epoch has no scenes.
pub fn compute_change_product(
    source: &dyn SceneSource,
    config: &PipelineConfig,
    kind: IndexKind,
) -> Result<Option<ChangeProduct>> {
    let region = config.region()?;
    let mode = config.processing_mode();
    let baseline = query_masked(source, config, &region, &config.baseline, mode)?;
    let current = query_masked(source, config, &region, &config.current, mode)?;
    change_from_epochs(&baseline, &current, config, &config.spectral_index(kind), &region, mode)
}

/// Yearly spatial means of `kind` over the aggregation region.
pub fn compute_year_series(
    source: &dyn SceneSource,
    config: &PipelineConfig,
    kind: IndexKind,
) -> Result<YearSeries> {
    let region = config.aggregation_region()?;
    let sampling = config.sampling();
    SamplingGrid::for_region(&region, sampling.resolution_m)?.check_cap(sampling.max_pixels)?;

    let mode = config.processing_mode();
    let scenes = query_masked(source, config, &region, &config.series_range()?, mode)?;
    year_series(
        &scenes,
        config.series.year_start,
        config.series.year_end,
        &config.spectral_index(kind),
        &region,
        &sampling,
        mode,
    )
}

/// The full change branch: NDVI and NDBI change, both masks, and their
/// areas over the simplified region.
///
/// Each epoch is queried and masked once and shared by both indices. The
/// sampling cap is checked before any scene is loaded.
pub fn run_change_branch(source: &dyn SceneSource, config: &PipelineConfig) -> Result<ChangeReport> {
    let region = config.region()?;
    let aggregation_region = config.aggregation_region()?;
    let sampling = config.sampling();
    SamplingGrid::for_region(&aggregation_region, sampling.resolution_m)?
        .check_cap(sampling.max_pixels)?;

    let mode = config.processing_mode();
    let (baseline, current) = mode
        .join(
            || query_masked(source, config, &region, &config.baseline, mode),
            || query_masked(source, config, &region, &config.current, mode),
        )
        .map_err(parallel_err)?;
    let (baseline, current) = (baseline?, current?);

    let mut changes = Vec::with_capacity(2);
    let mut areas = AreaResult::default();
    for kind in [IndexKind::Ndvi, IndexKind::Ndbi] {
        let index = config.spectral_index(kind);
        let threshold = config.threshold(kind);
        let label = mask_label(kind);

        let product = change_from_epochs(&baseline, &current, config, &index, &region, mode)?;
        let mask = product
            .as_ref()
            .map(|p| classify(&p.change, threshold))
            .transpose()?;
        let area_km2 = mask
            .as_ref()
            .map(|m| aggregate_area(m, &aggregation_region, &sampling))
            .transpose()?;

        match area_km2 {
            Some(km2) => info!("{} ({} {}): {:.4} km²", label, kind, threshold, km2),
            None => warn!("{}: no area, an epoch is missing", label),
        }
        areas.insert(label, area_km2);
        changes.push(IndexChange {
            index: kind,
            label,
            threshold,
            product,
            mask,
            area_km2,
        });
    }

    Ok(ChangeReport {
        changes,
        areas,
        aggregation_region,
    })
}
