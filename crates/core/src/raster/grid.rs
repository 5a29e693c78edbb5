//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::RasterElement;
use ndarray::{Array2, ArrayView2};

/// A single-band 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a 2D grid together with an
/// optional no-data sentinel. The grid carries no georeferencing: the
/// comparison pipeline consumes already co-registered tiles and never
/// interprets projection or geolocation.
///
/// # Type Parameters
///
/// - `T`: The cell value type, must implement [`RasterElement`]
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            nodata: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            nodata: None,
        }
    }

    /// Create a raster from existing data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            nodata: None,
        })
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self { data, nodata: None }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
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

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Legacy placeholder rasters are written as a single 1x1 cell
    pub fn is_placeholder(&self) -> bool {
        self.shape() == (1, 1)
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
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Boolean mask of no-data pixels.
    ///
    /// Returns `(has_nodata, mask)` where the flag is true iff the sentinel
    /// occurs anywhere in the band. Without a declared sentinel every pixel
    /// is valid and the mask is all-false.
    pub fn nodata_mask(&self) -> (bool, Array2<bool>) {
        match self.nodata {
            None => (false, Array2::from_elem(self.data.dim(), false)),
            Some(nd) => {
                let mask = self.data.mapv(|v| v.is_nodata(Some(nd)));
                let has_nodata = mask.iter().any(|&m| m);
                (has_nodata, mask)
            }
        }
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min = None;
        let mut max = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.is_none() || value < min.unwrap() {
                min = Some(value);
            }
            if max.is_none() || value > max.unwrap() {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
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
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 42.0);
    }

    #[test]
    fn test_placeholder_detection() {
        let tiny: Raster<f64> = Raster::new(1, 1);
        assert!(tiny.is_placeholder());
        let normal: Raster<f64> = Raster::new(1, 2);
        assert!(!normal.is_placeholder());
    }

    #[test]
    fn test_nodata_mask_without_sentinel() {
        let raster: Raster<f64> = Raster::filled(4, 4, f64::NAN);
        let (has_nodata, mask) = raster.nodata_mask();
        assert!(!has_nodata);
        assert!(mask.iter().all(|&m| !m));
    }

    #[test]
    fn test_nodata_mask_with_sentinel() {
        let mut raster: Raster<f64> = Raster::filled(3, 3, 1.0);
        raster.set_nodata(Some(-9999.0));
        raster.set(1, 1, -9999.0).unwrap();
        raster.set(2, 0, -9999.0).unwrap();

        let (has_nodata, mask) = raster.nodata_mask();
        assert!(has_nodata);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 2);
        assert!(mask[(1, 1)]);
        assert!(mask[(2, 0)]);
        assert!(!mask[(0, 0)]);
    }

    #[test]
    fn test_raster_statistics() {
        let mut raster: Raster<f32> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f32).unwrap();
            }
        }

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 100);
    }

    #[test]
    fn test_statistics_skip_nodata() {
        let mut raster: Raster<f64> = Raster::filled(2, 2, 5.0);
        raster.set_nodata(Some(-9999.0));
        raster.set(0, 0, -9999.0).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.valid_count, 3);
        assert_eq!(stats.nodata_count, 1);
        assert_eq!(stats.mean, Some(5.0));
    }
}
