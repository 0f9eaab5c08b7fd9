use crate::error::{QueryError, Result};
use crate::geo_transform::PixelCoordinate;
use crate::raster::RasterSource;

/// Band read when none is configured. Multi-band rasters are not inspected
/// beyond this band.
pub const DEFAULT_BAND: usize = 1;

/// Read a single sample from `band` (1-based) at `pixel`.
///
/// Complex rasters yield their real component.
pub fn sample<R: RasterSource + ?Sized>(
    raster: &R,
    band: usize,
    pixel: PixelCoordinate,
) -> Result<f64> {
    let band_count = raster.band_count();
    if band == 0 || band > band_count {
        return Err(QueryError::InvalidBand { band, band_count });
    }

    let (width, height) = raster.size();
    if !pixel.is_within(width, height) {
        return Err(QueryError::PixelOutOfRange {
            pixel,
            width,
            height,
        });
    }

    let value = raster.read_pixel(band, pixel)?;
    tracing::debug!(
        "Sampled band {} at pixel ({}, {}) of {:?}: {}",
        band,
        pixel.pixel,
        pixel.line,
        raster.path(),
        value
    );
    Ok(value)
}
