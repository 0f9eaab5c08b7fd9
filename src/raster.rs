use gdal::Dataset;
use std::path::{Path, PathBuf};

use crate::env::{ensure_initialized, reset_errors};
use crate::error::{QueryError, Result};
use crate::geo_transform::{GeoTransform, PixelCoordinate};
use crate::srs::SpatialReference;

/// The parts of an open raster dataset a value query needs.
pub trait RasterSource {
    /// Label used in diagnostics, usually the path.
    fn path(&self) -> &Path;

    /// `(width, height)` in pixels.
    fn size(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    /// Forward geotransform; [`QueryError::MissingGeoTransform`] if absent.
    fn geo_transform(&self) -> Result<GeoTransform>;

    /// Embedded coordinate system, if the raster carries one.
    fn spatial_reference(&self, traditional_axis_order: bool) -> Option<SpatialReference>;

    /// Read one sample. `band` is 1-based; callers validate band and extent.
    fn read_pixel(&self, band: usize, pixel: PixelCoordinate) -> Result<f64>;
}

/// A GDAL dataset opened read-only. Closed on drop.
pub struct GdalRaster {
    path: PathBuf,
    dataset: Dataset,
}

impl GdalRaster {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        ensure_initialized();

        let path = path.as_ref();
        reset_errors();
        let dataset = Dataset::open(path).map_err(|e| QueryError::RasterOpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!("Opened raster {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
        })
    }

    /// Wrap an already open dataset, e.g. one created with the `MEM` driver.
    pub fn from_dataset(dataset: Dataset, label: impl Into<PathBuf>) -> Self {
        Self {
            path: label.into(),
            dataset,
        }
    }
}

impl RasterSource for GdalRaster {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    fn band_count(&self) -> usize {
        self.dataset.raster_count()
    }

    fn geo_transform(&self) -> Result<GeoTransform> {
        reset_errors();
        self.dataset
            .geo_transform()
            .map(GeoTransform::from)
            .map_err(|e| QueryError::MissingGeoTransform {
                path: self.path.clone(),
                source: Some(e),
            })
    }

    fn spatial_reference(&self, traditional_axis_order: bool) -> Option<SpatialReference> {
        match self.dataset.spatial_ref() {
            Ok(srs) => Some(SpatialReference::from_raster(
                srs,
                &self.path.display().to_string(),
                traditional_axis_order,
            )),
            Err(e) => {
                tracing::debug!("Raster {:?} has no spatial reference: {}", self.path, e);
                None
            }
        }
    }

    fn read_pixel(&self, band: usize, pixel: PixelCoordinate) -> Result<f64> {
        let read_failed = |e| QueryError::RasterReadFailed {
            band,
            pixel,
            source: e,
        };

        reset_errors();
        let raster_band = self.dataset.rasterband(band).map_err(read_failed)?;
        // Complex bands are read as f64, which keeps the real component.
        reset_errors();
        let buffer = raster_band
            .read_as::<f64>((pixel.pixel, pixel.line), (1, 1), (1, 1), None)
            .map_err(read_failed)?;

        buffer
            .data()
            .first()
            .copied()
            .ok_or_else(|| {
                let (width, height) = self.dataset.raster_size();
                QueryError::PixelOutOfRange {
                    pixel,
                    width,
                    height,
                }
            })
    }
}
