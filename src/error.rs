use gdal::errors::GdalError;
use std::path::PathBuf;
use thiserror::Error;

use crate::geo_transform::PixelCoordinate;

pub type Result<T> = std::result::Result<T, QueryError>;

/// Failure kinds of a raster value query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSpatialReference,
    TransformConstructionFailed,
    TransformApplicationFailed,
    SingularGeoTransform,
    RasterOpenFailed,
    MissingGeoTransform,
    InvalidBand,
    PixelOutOfRange,
    RasterReadFailed,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid spatial reference: {input:?}")]
    InvalidSpatialReference {
        input: String,
        #[source]
        source: Option<GdalError>,
    },

    #[error("failed to build coordinate transform from {source_srs:?} to {target_srs:?}")]
    TransformConstructionFailed {
        source_srs: String,
        target_srs: String,
        #[source]
        source: GdalError,
    },

    #[error("failed to transform point ({x}, {y})")]
    TransformApplicationFailed {
        x: f64,
        y: f64,
        #[source]
        source: Option<GdalError>,
    },

    #[error("geotransform is not invertible: {coefficients:?}")]
    SingularGeoTransform { coefficients: [f64; 6] },

    #[error("unable to open raster {}", path.display())]
    RasterOpenFailed {
        path: PathBuf,
        #[source]
        source: GdalError,
    },

    #[error("raster {} has no geotransform", path.display())]
    MissingGeoTransform {
        path: PathBuf,
        #[source]
        source: Option<GdalError>,
    },

    #[error("band {band} does not exist (raster has {band_count} band(s))")]
    InvalidBand { band: usize, band_count: usize },

    #[error("pixel ({}, {}) is outside the {width}x{height} raster", pixel.pixel, pixel.line)]
    PixelOutOfRange {
        pixel: PixelCoordinate,
        width: usize,
        height: usize,
    },

    #[error("failed to read band {band} at pixel ({}, {})", pixel.pixel, pixel.line)]
    RasterReadFailed {
        band: usize,
        pixel: PixelCoordinate,
        #[source]
        source: GdalError,
    },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::InvalidSpatialReference { .. } => ErrorKind::InvalidSpatialReference,
            QueryError::TransformConstructionFailed { .. } => {
                ErrorKind::TransformConstructionFailed
            }
            QueryError::TransformApplicationFailed { .. } => ErrorKind::TransformApplicationFailed,
            QueryError::SingularGeoTransform { .. } => ErrorKind::SingularGeoTransform,
            QueryError::RasterOpenFailed { .. } => ErrorKind::RasterOpenFailed,
            QueryError::MissingGeoTransform { .. } => ErrorKind::MissingGeoTransform,
            QueryError::InvalidBand { .. } => ErrorKind::InvalidBand,
            QueryError::PixelOutOfRange { .. } => ErrorKind::PixelOutOfRange,
            QueryError::RasterReadFailed { .. } => ErrorKind::RasterReadFailed,
        }
    }
}
