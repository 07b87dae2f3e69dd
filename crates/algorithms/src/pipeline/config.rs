//! Pipeline configuration
//!
//! Every policy value of a run lives here: study area, epochs, cloud and
//! quality filters, band pairs, change thresholds, aggregation sampling and
//! export. The defaults reproduce the 2014 vs 2024 Jaipur study.

use crate::imagery::{BandPair, IndexKind, QualityBits, SpectralIndex, Threshold};
use crate::statistics::{AreaModel, ZonalSampling};
use crate::vector::simplify_region;
use landdelta_core::io::RasterFormat;
use landdelta_core::region::Region;
use landdelta_core::scene::DateRange;
use landdelta_core::{Error, Result, CRS};
use landdelta_parallel::ProcessingMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Study area as `[west, south, east, north]` in `crs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub bbox: [f64; 4],
    #[serde(default)]
    pub crs: CRS,
}

/// Band pair per index family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexBands {
    pub vegetation: BandPair,
    pub built_up: BandPair,
}

impl Default for IndexBands {
    fn default() -> Self {
        Self {
            vegetation: IndexKind::Ndvi.default_bands(),
            built_up: IndexKind::Ndbi.default_bands(),
        }
    }
}

/// Sampling used for area totals and series means
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub resolution_m: f64,
    pub max_pixels: u64,
    pub area_model: AreaModel,
    /// Douglas-Peucker tolerance applied to the region before aggregation
    pub simplify_tolerance_m: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            resolution_m: 120.0,
            max_pixels: 50_000_000,
            area_model: AreaModel::default(),
            simplify_tolerance_m: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub year_start: i32,
    pub year_end: i32,
    pub index: IndexKind,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            year_start: 2014,
            year_end: 2024,
            index: IndexKind::Ndvi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
    /// File name prefix, e.g. `Jaipur_small` -> `Jaipur_small_NDVI_change.tif`
    pub prefix: String,
    pub format: RasterFormat,
    /// Resample exports to this resolution over the aggregation region;
    /// `None` keeps the composite grid
    pub resolution_m: Option<f64>,
    pub write_masks: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            prefix: "Jaipur_small".to_string(),
            format: RasterFormat::GeoTiff,
            resolution_m: Some(120.0),
            write_masks: false,
        }
    }
}

/// Complete configuration of a change-detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub region: RegionConfig,
    pub baseline: DateRange,
    pub current: DateRange,
    /// Scenes with cloud cover at or above this percentage are skipped
    pub max_cloud_percent: f64,
    pub quality_bits: QualityBits,
    pub indices: IndexBands,
    pub vegetation_loss: Threshold,
    pub new_urban: Threshold,
    pub aggregation: AggregationConfig,
    pub series: SeriesConfig,
    pub export: ExportConfig,
    /// Worker threads; `None` uses every core
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig {
                bbox: [75.75, 26.85, 75.85, 26.95],
                crs: CRS::wgs84(),
            },
            baseline: DateRange::calendar_year(2014).expect("2014 is a valid year"),
            current: DateRange::calendar_year(2024).expect("2024 is a valid year"),
            max_cloud_percent: 20.0,
            quality_bits: QualityBits::landsat_default(),
            indices: IndexBands::default(),
            vegetation_loss: Threshold::less_than(-0.2),
            new_urban: Threshold::greater_than(0.1),
            aggregation: AggregationConfig::default(),
            series: SeriesConfig::default(),
            export: ExportConfig::default(),
            threads: None,
        }
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration; missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::InvalidParameter {
                name: "config",
                value: path.as_ref().display().to_string(),
                reason: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and internal consistency.
    pub fn validate(&self) -> Result<()> {
        self.region()?;

        if !(self.max_cloud_percent > 0.0 && self.max_cloud_percent <= 100.0) {
            return Err(invalid("max_cloud_percent", self.max_cloud_percent, "must be in (0, 100]"));
        }
        for (name, pair) in [
            ("indices.vegetation", self.indices.vegetation),
            ("indices.built_up", self.indices.built_up),
        ] {
            if pair.positive == pair.negative {
                return Err(invalid(name, pair.positive, "index needs two different bands"));
            }
        }
        for (name, t) in [("vegetation_loss", self.vegetation_loss), ("new_urban", self.new_urban)] {
            if !t.value.is_finite() {
                return Err(invalid(name, t.value, "threshold must be finite"));
            }
        }

        let agg = &self.aggregation;
        if !(agg.resolution_m.is_finite() && agg.resolution_m > 0.0) {
            return Err(invalid("aggregation.resolution_m", agg.resolution_m, "must be positive"));
        }
        if agg.max_pixels == 0 {
            return Err(invalid("aggregation.max_pixels", agg.max_pixels, "must be positive"));
        }
        if !(agg.simplify_tolerance_m.is_finite() && agg.simplify_tolerance_m >= 0.0) {
            return Err(invalid(
                "aggregation.simplify_tolerance_m",
                agg.simplify_tolerance_m,
                "must be non-negative",
            ));
        }

        if self.series.year_start > self.series.year_end {
            return Err(Error::InvalidDateRange {
                start: self.series.year_start.to_string(),
                end: self.series.year_end.to_string(),
            });
        }
        if let Some(res) = self.export.resolution_m {
            if !(res.is_finite() && res > 0.0) {
                return Err(invalid("export.resolution_m", res, "must be positive"));
            }
        }
        if self.threads == Some(0) {
            return Err(invalid("threads", 0, "must be at least 1"));
        }
        Ok(())
    }

    /// The study area
    pub fn region(&self) -> Result<Region> {
        let [w, s, e, n] = self.region.bbox;
        Region::from_bbox(w, s, e, n, self.region.crs.clone())
    }

    /// The study area simplified for aggregation
    pub fn aggregation_region(&self) -> Result<Region> {
        simplify_region(&self.region()?, self.aggregation.simplify_tolerance_m)
    }

    pub fn sampling(&self) -> ZonalSampling {
        ZonalSampling::new(self.aggregation.resolution_m, self.aggregation.max_pixels)
            .with_area_model(self.aggregation.area_model)
    }

    /// The configured index for `kind`
    pub fn spectral_index(&self, kind: IndexKind) -> SpectralIndex {
        let bands = match kind {
            IndexKind::Ndvi => self.indices.vegetation,
            IndexKind::Ndbi => self.indices.built_up,
        };
        SpectralIndex::new(kind, bands)
    }

    /// Change threshold applied to `kind`'s change raster
    pub fn threshold(&self, kind: IndexKind) -> Threshold {
        match kind {
            IndexKind::Ndvi => self.vegetation_loss,
            IndexKind::Ndbi => self.new_urban,
        }
    }

    /// Closed range from January 1st of the first series year to December
    /// 31st of the last
    pub fn series_range(&self) -> Result<DateRange> {
        let first = DateRange::calendar_year(self.series.year_start)?;
        let last = DateRange::calendar_year(self.series.year_end)?;
        DateRange::new(first.start(), last.end())
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        ProcessingMode::from_threads(self.threads)
    }
}

/// Label of the change mask derived from `kind`
pub fn mask_label(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Ndvi => "vegetation_loss",
        IndexKind::Ndbi => "new_urban",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::Direction;
    use crate::statistics::SamplingGrid;
    use landdelta_core::scene::Band;

    #[test]
    fn test_defaults_reproduce_study() {
        let c = PipelineConfig::default();
        c.validate().unwrap();
        assert_eq!(c.region.bbox, [75.75, 26.85, 75.85, 26.95]);
        assert!(c.region.crs.is_geographic());
        assert_eq!(c.baseline.to_string(), "2014-01-01..2014-12-31");
        assert_eq!(c.current.year(), 2024);
        assert_eq!(c.quality_bits.bits(), &[3, 5]);
        assert_eq!(c.indices.vegetation, BandPair::new(Band::Nir, Band::Red));
        assert_eq!(c.indices.built_up, BandPair::new(Band::Swir1, Band::Nir));
        assert_eq!(c.vegetation_loss.direction, Direction::LessThan);
        assert_eq!(c.new_urban, Threshold::greater_than(0.1));
        assert_eq!(c.aggregation.max_pixels, 50_000_000);
        assert_eq!(c.processing_mode(), ProcessingMode::Parallel);
    }

    #[test]
    fn test_default_pixel_area_follows_latitude() {
        let c = PipelineConfig::default();
        let sampling = c.sampling();
        assert_eq!(sampling.area_model, AreaModel::Ellipsoidal);

        let grid = SamplingGrid::for_region(&c.aggregation_region().unwrap(), sampling.resolution_m).unwrap();
        let north = grid.cell_area_m2(0, sampling.area_model);
        let south = grid.cell_area_m2(grid.rows() - 1, sampling.area_model);
        assert!(north < south, "north {} south {}", north, south);
        assert!((north - 120.0 * 120.0).abs() > 1e-6);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{
            "vegetation_loss": {"value": -0.3, "direction": "lt"},
            "indices": {
                "vegetation": {"positive": "nir", "negative": "red"},
                "built_up": {"positive": "SR_B7", "negative": "SR_B5"}
            },
            "aggregation": {"resolution_m": 30.0},
            "threads": 4
        }"#;
        let c: PipelineConfig = serde_json::from_str(json).unwrap();
        c.validate().unwrap();
        assert_eq!(c.vegetation_loss.value, -0.3);
        assert_eq!(c.indices.built_up.positive, Band::Swir2);
        assert_eq!(c.aggregation.resolution_m, 30.0);
        assert_eq!(c.aggregation.max_pixels, 50_000_000);
        assert_eq!(c.max_cloud_percent, 20.0);
        assert_eq!(c.processing_mode(), ProcessingMode::ParallelWith(4));
    }

    #[test]
    fn test_unknown_band_rejected() {
        let json = r#"{"indices": {
            "vegetation": {"positive": "SR_B9", "negative": "red"},
            "built_up": {"positive": "swir1", "negative": "nir"}
        }}"#;
        assert!(serde_json::from_str::<PipelineConfig>(json).is_err());
    }

    #[test]
    fn test_reversed_epoch_rejected() {
        let json = r#"{"baseline": {"start": "2014-12-31", "end": "2014-01-01"}}"#;
        assert!(serde_json::from_str::<PipelineConfig>(json).is_err());
    }

    #[test]
    fn test_validate_catches_bad_values() {
        let mut c = PipelineConfig::default();
        c.aggregation.resolution_m = 0.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.series.year_start = 2025;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.indices.vegetation = BandPair::new(Band::Red, Band::Red);
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.region.bbox = [1.0, 1.0, 0.0, 2.0];
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_json() {
        let c = PipelineConfig::default();
        let text = serde_json::to_string_pretty(&c).unwrap();
        assert!(text.contains("SR_B5"));
        let back: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_series_range_spans_years() {
        let c = PipelineConfig::default();
        let r = c.series_range().unwrap();
        assert_eq!(r.to_string(), "2014-01-01..2024-12-31");
    }
}
