use std::path::Path;

use crate::error::Result;
use crate::geo_transform::{InverseGeoTransform, PixelCoordinate};
use crate::raster::{GdalRaster, RasterSource};
use crate::sampler::{self, DEFAULT_BAND};
use crate::srs::SpatialReference;
use crate::transform::Reprojection;

/// Coordinate system query coordinates are given in unless configured.
pub const DEFAULT_SOURCE_SRS: &str = "WGS84";

/// ETRS89 / TM35FIN(E,N), assumed for rasters without an embedded system.
pub const DEFAULT_TARGET_SRS: &str = "EPSG:3067";

/// Where the raster's coordinate system comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSrs {
    /// Use the system embedded in the raster, else `fallback`. With neither,
    /// coordinates are taken to be in the raster's system already.
    Embedded { fallback: Option<String> },
    /// Always use this definition, ignoring raster metadata.
    Fixed(String),
}

impl Default for TargetSrs {
    fn default() -> Self {
        TargetSrs::Embedded {
            fallback: Some(DEFAULT_TARGET_SRS.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub source_srs: String,
    pub target_srs: TargetSrs,
    /// 1-based band index.
    pub band: usize,
    /// Treat coordinates as x/lon first regardless of authority axis order.
    pub traditional_axis_order: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            source_srs: DEFAULT_SOURCE_SRS.to_string(),
            target_srs: TargetSrs::default(),
            band: DEFAULT_BAND,
            traditional_axis_order: true,
        }
    }
}

impl QueryConfig {
    pub fn with_source_srs(mut self, source_srs: impl Into<String>) -> Self {
        self.source_srs = source_srs.into();
        self
    }

    pub fn with_target_srs(mut self, target_srs: TargetSrs) -> Self {
        self.target_srs = target_srs;
        self
    }

    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    pub fn with_traditional_axis_order(mut self, traditional: bool) -> Self {
        self.traditional_axis_order = traditional;
        self
    }
}

/// An open raster prepared for value lookups.
///
/// Holds the raster, the reprojection into its coordinate system, and the
/// inverted geotransform. Everything is built once and released on drop, so
/// a failure at any step frees what was acquired before it.
pub struct RasterQuery<R = GdalRaster> {
    raster: R,
    reprojection: Reprojection,
    inverse: InverseGeoTransform,
    band: usize,
}

impl RasterQuery<GdalRaster> {
    pub fn open(path: impl AsRef<Path>, config: &QueryConfig) -> Result<Self> {
        let raster = GdalRaster::open(path)?;
        Self::new(raster, config)
    }
}

impl<R: RasterSource> RasterQuery<R> {
    pub fn new(raster: R, config: &QueryConfig) -> Result<Self> {
        let source = SpatialReference::resolve_with_axis_order(
            &config.source_srs,
            config.traditional_axis_order,
        )?;
        let reprojection = match resolve_target(&raster, config)? {
            Some(target) => Reprojection::between(&source, &target)?,
            None => {
                tracing::warn!(
                    "Raster {:?} has no spatial reference and no fallback is configured; \
                     using coordinates as given",
                    raster.path()
                );
                Reprojection::Identity
            }
        };

        let inverse = raster.geo_transform()?.invert()?;

        tracing::debug!(
            "Prepared query on {:?} ({}x{} pixels, band {})",
            raster.path(),
            raster.size().0,
            raster.size().1,
            config.band
        );
        Ok(Self {
            raster,
            reprojection,
            inverse,
            band: config.band,
        })
    }

    /// Raster cell containing `(x, y)`, given in the configured source system.
    pub fn pixel(&self, x: f64, y: f64) -> Result<PixelCoordinate> {
        let (geo_x, geo_y) = self.reprojection.apply(x, y)?;
        Ok(self.inverse.to_pixel(geo_x, geo_y))
    }

    /// Value of the configured band at `(x, y)`.
    pub fn value(&self, x: f64, y: f64) -> Result<f64> {
        let pixel = self.pixel(x, y)?;
        sampler::sample(&self.raster, self.band, pixel)
    }

    /// One independent single-point lookup per entry, reusing one transform.
    /// Each point fails alone.
    pub fn values(&self, points: &[(f64, f64)]) -> Vec<Result<f64>> {
        points.iter().map(|&(x, y)| self.value(x, y)).collect()
    }

    pub fn reprojection(&self) -> &Reprojection {
        &self.reprojection
    }

    pub fn inverse_geo_transform(&self) -> &InverseGeoTransform {
        &self.inverse
    }

    pub fn raster(&self) -> &R {
        &self.raster
    }
}

fn resolve_target<R: RasterSource>(
    raster: &R,
    config: &QueryConfig,
) -> Result<Option<SpatialReference>> {
    let axis_order = config.traditional_axis_order;
    match &config.target_srs {
        TargetSrs::Fixed(definition) => {
            SpatialReference::resolve_with_axis_order(definition, axis_order).map(Some)
        }
        TargetSrs::Embedded { fallback } => match raster.spatial_reference(axis_order) {
            Some(srs) => Ok(Some(srs)),
            None => fallback
                .as_deref()
                .map(|definition| {
                    tracing::debug!(
                        "Raster {:?} has no spatial reference, assuming {:?}",
                        raster.path(),
                        definition
                    );
                    SpatialReference::resolve_with_axis_order(definition, axis_order)
                })
                .transpose(),
        },
    }
}

/// Value at `(x, y)` in `source_srs`, using default settings otherwise.
pub fn query_value(path: impl AsRef<Path>, source_srs: &str, x: f64, y: f64) -> Result<f64> {
    let config = QueryConfig::default().with_source_srs(source_srs);
    query_value_with(path, &config, x, y)
}

pub fn query_value_with(path: impl AsRef<Path>, config: &QueryConfig, x: f64, y: f64) -> Result<f64> {
    RasterQuery::open(path, config)?.value(x, y)
}

/// Value at a WGS84 longitude/latitude.
pub fn raster_value(path: impl AsRef<Path>, longitude: f64, latitude: f64) -> Result<f64> {
    query_value(path, DEFAULT_SOURCE_SRS, longitude, latitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::raster::fixtures::{constant_raster, mem_raster};

    fn native_config() -> QueryConfig {
        QueryConfig::default().with_target_srs(TargetSrs::Embedded { fallback: None })
    }

    fn prepare<R: RasterSource>(raster: R, config: &QueryConfig) -> RasterQuery<R> {
        match RasterQuery::new(raster, config) {
            Ok(query) => query,
            Err(e) => panic!("failed to prepare query: {}", e),
        }
    }

    fn prepare_err<R: RasterSource>(raster: R, config: &QueryConfig) -> ErrorKind {
        match RasterQuery::new(raster, config) {
            Ok(_) => panic!("query preparation unexpectedly succeeded"),
            Err(e) => e.kind(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.source_srs, "WGS84");
        assert_eq!(config.band, 1);
        assert_eq!(
            config.target_srs,
            TargetSrs::Embedded {
                fallback: Some("EPSG:3067".to_string())
            }
        );
    }

    #[test]
    fn test_constant_raster_everywhere_inside() {
        let query = prepare(constant_raster(42.0), &native_config());
        assert!(query.reprojection().is_identity());
        for (x, y) in [(0.0, 4.0), (0.5, 3.5), (3.99, 0.01), (2.0, 2.0), (1.0, 1.5)] {
            assert_eq!(query.value(x, y).unwrap(), 42.0, "at ({}, {})", x, y);
        }
    }

    #[test]
    fn test_same_system_matches_direct_inversion() {
        let gt = [385000.0, 10.0, 0.0, 6672000.0, 0.0, -10.0];
        let raster = mem_raster(8, 8, Some(gt), Some(3067), (0..64).map(|v| v as f64).collect());
        let config = QueryConfig::default().with_source_srs("EPSG:3067");
        let query = prepare(raster, &config);

        assert!(query.reprojection().is_identity());
        let (x, y) = (385025.0, 6671945.0);
        let expected = query.inverse_geo_transform().to_pixel(x, y);
        assert_eq!(expected, PixelCoordinate::new(2, 5));
        assert_eq!(query.pixel(x, y).unwrap(), expected);
        assert_eq!(query.value(x, y).unwrap(), 42.0);
    }

    #[test]
    fn test_reprojects_into_embedded_system() {
        // 1 km cells around the TM35FIN central meridian
        let gt = [495000.0, 1000.0, 0.0, 6656000.0, 0.0, -1000.0];
        let raster = mem_raster(10, 10, Some(gt), Some(3067), (0..100).map(|v| v as f64).collect());
        let query = prepare(raster, &QueryConfig::default());

        assert!(!query.reprojection().is_identity());
        // Just east of 27E at 60N: easting ~500280, northing ~6651400
        let pixel = query.pixel(27.005, 60.0).unwrap();
        assert_eq!(pixel.pixel, 5);
        assert!((4..=5).contains(&pixel.line), "line {}", pixel.line);
        let value = query.value(27.005, 60.0).unwrap();
        assert_eq!(value, (pixel.line * 10 + pixel.pixel) as f64);
    }

    #[test]
    fn test_fallback_srs_when_raster_has_none() {
        let gt = [495000.0, 1000.0, 0.0, 6656000.0, 0.0, -1000.0];
        let raster = mem_raster(10, 10, Some(gt), None, vec![7.0; 100]);
        let query = prepare(raster, &QueryConfig::default());
        assert!(!query.reprojection().is_identity());
        assert_eq!(query.value(27.005, 60.0).unwrap(), 7.0);
    }

    #[test]
    fn test_fixed_target_overrides_embedded() {
        // The embedded TM35FIN definition is ignored in favour of the fixed one
        let raster = mem_raster(4, 4, Some([0.0, 1.0, 0.0, 4.0, 0.0, -1.0]), Some(3067), vec![1.0; 16]);
        let config = QueryConfig::default()
            .with_source_srs("EPSG:4326")
            .with_target_srs(TargetSrs::Fixed("EPSG:4326".to_string()));
        let query = prepare(raster, &config);
        assert!(query.reprojection().is_identity());
        assert_eq!(query.value(1.5, 2.5).unwrap(), 1.0);
    }

    #[test]
    fn test_point_outside_raster() {
        let query = prepare(constant_raster(42.0), &native_config());
        assert_eq!(query.value(-0.5, 2.0).unwrap_err().kind(), ErrorKind::PixelOutOfRange);
        assert_eq!(query.value(2.0, 4.5).unwrap_err().kind(), ErrorKind::PixelOutOfRange);
        assert_eq!(query.value(4.0, 2.0).unwrap_err().kind(), ErrorKind::PixelOutOfRange);
    }

    #[test]
    fn test_batch_values_fail_independently() {
        let query = prepare(constant_raster(42.0), &native_config());
        let results = query.values(&[(1.0, 1.0), (10.0, 10.0), (3.0, 3.0)]);
        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 42.0);
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::PixelOutOfRange);
        assert_eq!(*results[2].as_ref().unwrap(), 42.0);
    }

    #[test]
    fn test_invalid_source_srs() {
        let config = native_config().with_source_srs("not a real SRS!!");
        assert_eq!(
            prepare_err(constant_raster(1.0), &config),
            ErrorKind::InvalidSpatialReference
        );
    }

    #[test]
    fn test_invalid_fixed_target_srs() {
        let config = QueryConfig::default().with_target_srs(TargetSrs::Fixed("EPSG:0".to_string()));
        assert_eq!(
            prepare_err(constant_raster(1.0), &config),
            ErrorKind::InvalidSpatialReference
        );
    }

    #[test]
    fn test_missing_geotransform() {
        let raster = mem_raster(2, 2, None, None, vec![0.0; 4]);
        assert_eq!(
            prepare_err(raster, &native_config()),
            ErrorKind::MissingGeoTransform
        );
    }

    #[test]
    fn test_singular_geotransform() {
        let raster = mem_raster(2, 2, Some([5.0, 0.0, 0.0, 5.0, 0.0, 0.0]), None, vec![0.0; 4]);
        assert_eq!(
            prepare_err(raster, &native_config()),
            ErrorKind::SingularGeoTransform
        );
    }

    #[test]
    fn test_invalid_band() {
        let query = prepare(constant_raster(42.0), &native_config().with_band(2));
        assert_eq!(query.value(1.0, 1.0).unwrap_err().kind(), ErrorKind::InvalidBand);
    }

    #[test]
    fn test_open_failure_reports_path() {
        let err = raster_value("/nonexistent/dem.tif", 27.0, 60.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RasterOpenFailed);
        assert!(err.to_string().contains("/nonexistent/dem.tif"));
    }
}
