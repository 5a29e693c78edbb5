//! Native TIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for single-band TIFF I/O, including the
//! `GDAL_NODATA` ASCII tag (42113) so no-data sentinels survive a
//! round-trip without GDAL. For other formats and exotic sample layouts,
//! enable the `gdal` feature.

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use num_traits::NumCast;
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// TIFF tag holding GDAL's no-data sentinel as an ASCII string
const GDAL_NODATA_TAG: u16 = 42113;

/// Read a single-band TIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_samples(&buf),
        DecodingResult::F64(buf) => cast_samples(&buf),
        DecodingResult::U8(buf) => cast_samples(&buf),
        DecodingResult::U16(buf) => cast_samples(&buf),
        DecodingResult::U32(buf) => cast_samples(&buf),
        DecodingResult::I8(buf) => cast_samples(&buf),
        DecodingResult::I16(buf) => cast_samples(&buf),
        DecodingResult::I32(buf) => cast_samples(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

/// Read only the dimensions of a TIFF file, as (rows, cols)
pub fn read_dimensions<P: AsRef<Path>>(path: P) -> Result<(usize, usize)> {
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    Ok((height as usize, width as usize))
}

/// Cast a decoded sample buffer to the requested element type
fn cast_samples<T, S>(buf: &[S]) -> Vec<T>
where
    T: RasterElement,
    S: Copy + NumCast,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// Attempt to read the GDAL_NODATA tag
fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let text = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA_TAG))
        .ok()?;
    let value: f64 = text
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .parse()
        .ok()?;
    if value.is_nan() {
        return Some(T::default_nodata());
    }
    num_traits::cast(value)
}

/// Write a Raster to a TIFF file
///
/// Native writer emits 32-bit float grayscale and tags the no-data
/// sentinel as GDAL_NODATA when one is set.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    if let Some(nodata) = raster.nodata() {
        let text = match nodata.to_f64() {
            Some(v) if v.is_nan() => "nan".to_string(),
            Some(v) => format!("{}", v),
            None => "nan".to_string(),
        };
        image
            .encoder()
            .write_tag(Tag::Unknown(GDAL_NODATA_TAG), text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
