//! TIFF reading and writing using GDAL

use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// Read band 1 of a GDAL-readable raster into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let rasterband = dataset.rasterband(1)?;

    let (cols, rows) = dataset.raster_size();
    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;

    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Some(nodata) = rasterband.no_data_value() {
        if let Some(nd) = num_traits::cast(nodata) {
            raster.set_nodata(Some(nd));
        }
    }

    Ok(raster)
}

/// Read only the dimensions of a raster file, as (rows, cols)
pub fn read_dimensions<P: AsRef<Path>>(path: P) -> Result<(usize, usize)> {
    let dataset = Dataset::open(path.as_ref())?;
    let (cols, rows) = dataset.raster_size();
    Ok((rows, cols))
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = raster.shape();

    let mut dataset = driver.create_with_band_type::<T, _>(
        path.as_ref(),
        cols,
        rows,
        1,
    )?;

    let mut band = dataset.rasterband(1)?;

    if let Some(nodata) = raster.nodata() {
        if let Some(nd) = nodata.to_f64() {
            band.set_no_data_value(Some(nd))?;
        }
    }

    let data: Vec<T> = raster.data().iter().copied().collect();
    let mut buffer = Buffer::new((cols, rows), data);
    band.write((0, 0), (cols, rows), &mut buffer)?;

    Ok(())
}
