//! Writing change products to disk

use super::{ChangeReport, PipelineConfig};
use crate::statistics::{resample_nearest, SamplingGrid};
use landdelta_core::io::write_raster;
use landdelta_core::raster::{Raster, RasterElement};
use landdelta_core::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// A raster written by [`export_change_report`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedRaster {
    pub path: PathBuf,
    pub rows: usize,
    pub cols: usize,
}

fn write_one<T: RasterElement>(
    raster: &Raster<T>,
    grid: Option<&SamplingGrid>,
    path: PathBuf,
    config: &PipelineConfig,
) -> Result<ExportedRaster> {
    let resampled;
    let out = match grid {
        Some(g) => {
            resampled = resample_nearest(raster, g)?;
            &resampled
        }
        None => raster,
    };
    write_raster(out, &path, config.export.format)?;
    info!("Wrote {} ({}x{})", path.display(), out.rows(), out.cols());
    Ok(ExportedRaster {
        path,
        rows: out.rows(),
        cols: out.cols(),
    })
}

fn file_name(config: &PipelineConfig, stem: &str) -> String {
    format!("{}_{}.{}", config.export.prefix, stem, config.export.format.extension())
}

/// Write every change raster (and the masks when configured) into the
/// export directory, which is created if needed.
///
/// Files are named `<prefix>_<INDEX>_change.<ext>` and
/// `<prefix>_<label>_mask.<ext>`. With an export resolution the rasters are
/// resampled over the aggregation region first; that grid is held to the
/// aggregation pixel cap.
pub fn export_change_report(report: &ChangeReport, config: &PipelineConfig) -> Result<Vec<ExportedRaster>> {
    let grid = config
        .export
        .resolution_m
        .map(|res| SamplingGrid::for_region(&report.aggregation_region, res))
        .transpose()?;
    if let Some(grid) = &grid {
        grid.check_cap(config.aggregation.max_pixels)?;
    }

    let dir: &Path = &config.export.directory;
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for change in &report.changes {
        let Some(product) = &change.product else {
            continue;
        };
        let name = file_name(config, &format!("{}_change", change.index.name()));
        written.push(write_one(&product.change, grid.as_ref(), dir.join(name), config)?);

        if config.export.write_masks {
            if let Some(mask) = &change.mask {
                let name = file_name(config, &format!("{}_mask", change.label));
                written.push(write_one(mask, grid.as_ref(), dir.join(name), config)?);
            }
        }
    }
    Ok(written)
}
