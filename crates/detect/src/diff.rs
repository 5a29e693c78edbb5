//! Pixel-wise raster differencing
//!
//! Produces the nodata-neutral absolute difference between a reference and
//! a target tile. A missing target is a normal outcome, not an error.

use demdelta_core::io::read_geotiff;
use demdelta_core::{Error, Raster, Result};
use ndarray::{Array2, Zip};
use std::path::Path;

/// Outcome of differencing a tile pair
#[derive(Debug, Clone)]
pub enum Difference {
    /// The target tile does not exist
    NoMatch,
    /// Elementwise absolute difference between the epochs
    Pixels(Array2<f64>),
}

impl Difference {
    /// True when the target tile was absent
    pub fn is_no_match(&self) -> bool {
        matches!(self, Difference::NoMatch)
    }
}

/// Compute the pixel-wise absolute difference between two raster tiles.
///
/// Pixels flagged as nodata in either epoch are zeroed in both before
/// subtraction, so the sentinel value never leaks into the difference.
/// A 1x1 raster on either side is the legacy placeholder for an empty
/// tile and short-circuits to a single-element zero array.
///
/// Returns `Error::SizeMismatch` when the rasters disagree on dimensions;
/// upstream tiling guarantees this never happens, so callers treat it as
/// fatal.
pub fn difference(reference: &Path, target: &Path) -> Result<Difference> {
    if !target.is_file() {
        return Ok(Difference::NoMatch);
    }

    let reference_raster: Raster<f64> = read_geotiff(reference)?;
    let target_raster: Raster<f64> = read_geotiff(target)?;

    if reference_raster.is_placeholder() || target_raster.is_placeholder() {
        return Ok(Difference::Pixels(Array2::zeros((1, 1))));
    }

    if reference_raster.shape() != target_raster.shape() {
        let (er, ec) = reference_raster.shape();
        let (ar, ac) = target_raster.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let (_, mask_reference) = reference_raster.nodata_mask();
    let (_, mask_target) = target_raster.nodata_mask();

    // Union of the masks: a pixel without a measurement in either epoch is
    // treated as height zero in both, not excluded.
    let mut reference_data = reference_raster.into_array();
    let mut target_data = target_raster.into_array();
    Zip::from(&mut reference_data)
        .and(&mut target_data)
        .and(&mask_reference)
        .and(&mask_target)
        .for_each(|r, t, &mr, &mt| {
            if mr || mt {
                *r = 0.0;
                *t = 0.0;
            }
        });

    Ok(Difference::Pixels((target_data - reference_data).mapv(f64::abs)))
}
