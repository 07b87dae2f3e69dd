//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major `(row, col)` grid with
/// its affine transform and CRS. Floating-point rasters use NaN as the
/// invalid-pixel marker; every reduction in this workspace skips cells for
/// which [`Raster::is_nodata`] holds instead of treating them as zero.
///
/// # Example
///
/// ```ignore
/// use landdelta_core::Raster;
///
/// let mut ndvi: Raster<f64> = Raster::filled(100, 100, f64::NAN);
/// ndvi.set(10, 20, 0.42)?;
/// assert_eq!(ndvi.statistics().valid_count, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// A raster of another element type on the same grid, from row-major data.
    pub fn derive<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut out = Raster::from_vec(data, rows, cols)?;
        out.transform = self.transform;
        out.crs = self.crs.clone();
        out.nodata = nodata;
        Ok(out)
    }

    /// Same grid and metadata, every cell set to `fill_value`
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail with `SizeMismatch` unless `other` has the same shape.
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        let (er, ec) = self.shape();
        let (ar, ac) = other.shape();
        if (er, ec) != (ar, ac) {
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    /// Value of the cell containing map coordinate (x, y), if inside the grid.
    pub fn sample(&self, x: f64, y: f64) -> Option<T> {
        let (row, col) = self.transform.cell_at(x, y, self.cols(), self.rows())?;
        Some(self.data[(row, col)])
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Pixel-center map coordinates of (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    // Value checks

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Count of cells that are not no-data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Min, max and mean over valid cells
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum = 0.0_f64;
        let mut count = 0_usize;

        for &value in self.data.iter().filter(|&&v| !self.is_nodata(v)) {
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = RasterElement::to_f64(value) {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access_out_of_bounds() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
        assert!(raster.get(10, 0).is_err());
        assert!(raster.set(0, 10, 1.0).is_err());
    }

    #[test]
    fn test_statistics_skip_nan() {
        let mut raster: Raster<f64> = Raster::filled(2, 2, 0.5);
        raster.set(0, 0, f64::NAN).unwrap();
        raster.set(1, 1, -0.5).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.nodata_count, 1);
        assert_eq!(stats.min, Some(-0.5));
        assert_eq!(stats.max, Some(0.5));
        assert!((stats.mean.unwrap() - 0.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_statistics_all_invalid_has_no_mean() {
        let raster: Raster<f64> = Raster::filled(3, 3, f64::NAN);
        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 0);
        assert!(stats.mean.is_none());
    }

    #[test]
    fn test_derive_keeps_grid() {
        let mut src: Raster<f64> = Raster::new(2, 3);
        src.set_transform(GeoTransform::new(10.0, 20.0, 30.0, -30.0));
        src.set_crs(Some(CRS::utm(43, true)));

        let mask = src.derive::<u8>(vec![1; 6], None).unwrap();
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.transform(), src.transform());
        assert_eq!(mask.crs(), src.crs());
        assert!(src.derive::<u8>(vec![1; 5], None).is_err());
    }

    #[test]
    fn test_sample_by_coordinate() {
        let mut raster: Raster<f64> = Raster::new(2, 2);
        raster.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        raster.set(1, 0, 7.0).unwrap();
        assert_eq!(raster.sample(5.0, 5.0), Some(7.0));
        assert_eq!(raster.sample(25.0, 5.0), None);
    }
}
