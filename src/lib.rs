pub mod env;
pub mod error;
pub mod geo_transform;
pub mod query;
pub mod raster;
pub mod sampler;
pub mod srs;
pub mod transform;

pub use error::{ErrorKind, QueryError, Result};
pub use geo_transform::{GeoTransform, InverseGeoTransform, PixelCoordinate};
pub use query::{query_value, query_value_with, raster_value, QueryConfig, RasterQuery, TargetSrs};
pub use raster::{GdalRaster, RasterSource};
pub use srs::SpatialReference;
pub use transform::{CoordinateTransform, Reprojection};
