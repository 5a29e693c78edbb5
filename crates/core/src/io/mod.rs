//! I/O operations for reading and writing raster tiles

#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_dimensions, read_geotiff, write_geotiff};

#[cfg(not(feature = "gdal"))]
pub use native::{read_dimensions, read_geotiff, write_geotiff};
