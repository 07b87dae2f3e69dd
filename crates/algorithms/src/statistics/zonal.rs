//! Zonal reductions over a region
//!
//! Masks and index rasters are reduced over a region by sampling them on a
//! regular grid at a nominal resolution (coarser than native for large
//! regions). Every reduction first estimates the grid's pixel count and
//! refuses to run above the configured cap.

use super::pixel_area::{metres_per_degree, AreaModel};
use crate::maybe_rayon::*;
use landdelta_core::raster::{GeoTransform, Raster, RasterElement};
use landdelta_core::region::Region;
use landdelta_core::{Error, Result, CRS};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampling parameters shared by area totals and spatial means
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZonalSampling {
    /// Nominal cell side in metres
    pub resolution_m: f64,
    /// Largest pixel count a reduction may touch
    pub max_pixels: u64,
    #[serde(default)]
    pub area_model: AreaModel,
}

impl ZonalSampling {
    pub fn new(resolution_m: f64, max_pixels: u64) -> Self {
        Self {
            resolution_m,
            max_pixels,
            area_model: AreaModel::default(),
        }
    }

    pub fn with_area_model(mut self, area_model: AreaModel) -> Self {
        self.area_model = area_model;
        self
    }
}

impl Default for ZonalSampling {
    fn default() -> Self {
        Self::new(120.0, 50_000_000)
    }
}

/// A north-up grid covering a region's bounding box at a metre resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    transform: GeoTransform,
    rows: usize,
    cols: usize,
    resolution_m: f64,
    /// Cell size in degrees for geographic regions
    cell_deg: Option<(f64, f64)>,
    crs: CRS,
}

impl SamplingGrid {
    /// Grid over `region`'s bbox with cells of `resolution_m` metres.
    ///
    /// For geographic regions the resolution is converted to degrees at the
    /// centroid latitude.
    pub fn for_region(region: &Region, resolution_m: f64) -> Result<Self> {
        if !(resolution_m.is_finite() && resolution_m > 0.0) {
            return Err(Error::InvalidParameter {
                name: "resolution_m",
                value: resolution_m.to_string(),
                reason: "must be a positive number of metres".into(),
            });
        }

        let (x0, y0, x1, y1) = region.bbox();
        let (dx, dy, cell_deg) = if region.is_geographic() {
            let (_, lat) = region.centroid();
            let (mx, my) = metres_per_degree(lat);
            let (dlon, dlat) = (resolution_m / mx, resolution_m / my);
            (dlon, dlat, Some((dlon, dlat)))
        } else {
            (resolution_m, resolution_m, None)
        };

        // Tolerance keeps exact multiples from gaining a sliver column.
        // Float-to-int casts saturate, so huge counts stay representable
        // and are rejected by `check_cap`.
        let cols = (((x1 - x0) / dx) - 1e-9).ceil().max(1.0) as usize;
        let rows = (((y1 - y0) / dy) - 1e-9).ceil().max(1.0) as usize;

        Ok(Self {
            transform: GeoTransform::new(x0, y1, dx, -dy),
            rows,
            cols,
            resolution_m,
            cell_deg,
            crs: region.crs().clone(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Cell count, saturating at `u64::MAX` for absurdly fine grids
    pub fn pixel_count(&self) -> u64 {
        (self.rows as u64)
            .checked_mul(self.cols as u64)
            .unwrap_or(u64::MAX)
    }

    /// `ResourceExceeded` if the grid holds more than `max_pixels` cells.
    pub fn check_cap(&self, max_pixels: u64) -> Result<()> {
        let estimated = self.pixel_count();
        if estimated > max_pixels {
            return Err(Error::ResourceExceeded {
                estimated,
                max_pixels,
            });
        }
        Ok(())
    }

    /// Map coordinates of the centre of (row, col)
    pub fn cell_centre(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Ground area in m² of a cell in `row`
    pub fn cell_area_m2(&self, row: usize, model: AreaModel) -> f64 {
        let (_, y) = self.cell_centre(row, 0);
        model.cell_area_m2(self.resolution_m, self.cell_deg, y)
    }
}

fn ensure_same_crs<T: RasterElement>(raster: &Raster<T>, region: &Region) -> Result<()> {
    match raster.crs() {
        Some(crs) if !crs.is_equivalent(region.crs()) => Err(Error::InvalidRegion(format!(
            "region is in {} but raster is in {}",
            region.crs(),
            crs
        ))),
        _ => Ok(()),
    }
}

fn prepare<T: RasterElement>(
    raster: &Raster<T>,
    region: &Region,
    sampling: &ZonalSampling,
) -> Result<SamplingGrid> {
    ensure_same_crs(raster, region)?;
    let grid = SamplingGrid::for_region(region, sampling.resolution_m)?;
    debug!(
        "Sampling grid {}x{} at {} m: {} pixels (cap {})",
        grid.rows,
        grid.cols,
        sampling.resolution_m,
        grid.pixel_count(),
        sampling.max_pixels
    );
    grid.check_cap(sampling.max_pixels)?;
    Ok(grid)
}

/// Area in km² of the true cells of `mask` inside `region`.
///
/// Each sampling cell whose centre lies in the region contributes
/// `mask × cell area`; the mask value is taken from the mask cell containing
/// the sample centre.
pub fn aggregate_area(mask: &Raster<u8>, region: &Region, sampling: &ZonalSampling) -> Result<f64> {
    let grid = prepare(mask, region, sampling)?;
    let model = sampling.area_model;

    let total_m2: f64 = (0..grid.rows)
        .into_par_iter()
        .map(|row| {
            let cell_area = grid.cell_area_m2(row, model);
            let mut sum = 0.0;
            for col in 0..grid.cols {
                let (x, y) = grid.cell_centre(row, col);
                if !region.contains(x, y) {
                    continue;
                }
                if let Some(v) = mask.sample(x, y) {
                    if v != 0 && !mask.is_nodata(v) {
                        sum += cell_area;
                    }
                }
            }
            sum
        })
        .sum();

    Ok(total_m2 / 1e6)
}

/// Area-weighted mean of the valid values of `raster` inside `region`.
///
/// `None` when no valid pixel falls in the region.
pub fn spatial_mean(raster: &Raster<f64>, region: &Region, sampling: &ZonalSampling) -> Result<Option<f64>> {
    let grid = prepare(raster, region, sampling)?;
    let model = sampling.area_model;

    let partials: Vec<(f64, f64)> = (0..grid.rows)
        .into_par_iter()
        .map(|row| {
            let cell_area = grid.cell_area_m2(row, model);
            let (mut weighted, mut weight) = (0.0, 0.0);
            for col in 0..grid.cols {
                let (x, y) = grid.cell_centre(row, col);
                if !region.contains(x, y) {
                    continue;
                }
                match raster.sample(x, y) {
                    Some(v) if !raster.is_nodata(v) => {
                        weighted += v * cell_area;
                        weight += cell_area;
                    }
                    _ => {}
                }
            }
            (weighted, weight)
        })
        .collect();

    let (weighted, weight) = partials
        .into_iter()
        .fold((0.0, 0.0), |(a, b), (w, n)| (a + w, b + n));
    Ok((weight > 0.0).then(|| weighted / weight))
}

/// Copy of `raster` with pixels whose centre lies outside `region` set to NaN.
pub fn clip_to_region(raster: &Raster<f64>, region: &Region) -> Raster<f64> {
    let transform = *raster.transform();
    let mut out = raster.clone();
    out.set_nodata(Some(f64::NAN));
    for ((row, col), v) in out.data_mut().indexed_iter_mut() {
        let (x, y) = transform.pixel_to_geo(col, row);
        if !region.contains(x, y) {
            *v = f64::NAN;
        }
    }
    out
}

/// Nearest-neighbour resampling of `raster` onto `grid`.
///
/// Cells whose centre falls outside the source raster get the source
/// no-data value (or the type's default no-data).
pub fn resample_nearest<T: RasterElement>(raster: &Raster<T>, grid: &SamplingGrid) -> Result<Raster<T>> {
    let fill = raster.nodata().unwrap_or_else(T::default_nodata);

    let data: Vec<T> = (0..grid.rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..grid.cols)
                .map(|col| {
                    let (x, y) = grid.cell_centre(row, col);
                    raster.sample(x, y).unwrap_or(fill)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut out = Raster::from_vec(data, grid.rows, grid.cols)?;
    out.set_transform(grid.transform);
    out.set_crs(Some(grid.crs.clone()));
    out.set_nodata(Some(fill));
    Ok(out)
}
