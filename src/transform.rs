use gdal::spatial_ref::CoordTransform;

use crate::env::reset_errors;
use crate::error::{QueryError, Result};
use crate::srs::SpatialReference;

/// A directed transform between two coordinate systems.
///
/// GDAL clones both spatial references into the transform, so it stays valid
/// after they are dropped and can be applied to any number of points.
pub struct CoordinateTransform {
    inner: CoordTransform,
    source: String,
    target: String,
}

impl std::fmt::Debug for CoordinateTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl CoordinateTransform {
    pub fn build(source: &SpatialReference, target: &SpatialReference) -> Result<Self> {
        reset_errors();
        let inner = CoordTransform::new(source.as_gdal(), target.as_gdal()).map_err(|e| {
            QueryError::TransformConstructionFailed {
                source_srs: source.input().to_string(),
                target_srs: target.input().to_string(),
                source: e,
            }
        })?;

        tracing::debug!(
            "Built coordinate transform {:?} -> {:?}",
            source.input(),
            target.input()
        );
        Ok(Self {
            inner,
            source: source.input().to_string(),
            target: target.input().to_string(),
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut xs = [x];
        let mut ys = [y];
        reset_errors();
        self.inner
            .transform_coords(&mut xs, &mut ys, &mut [])
            .map_err(|e| QueryError::TransformApplicationFailed {
                x,
                y,
                source: Some(e),
            })?;

        if !xs[0].is_finite() || !ys[0].is_finite() {
            return Err(QueryError::TransformApplicationFailed { x, y, source: None });
        }
        Ok((xs[0], ys[0]))
    }
}

/// How query coordinates reach the raster's coordinate system.
#[derive(Debug)]
pub enum Reprojection {
    /// Source and target are the same system; points pass through unchanged.
    Identity,
    Transform(CoordinateTransform),
}

impl Reprojection {
    /// Build the reprojection from `source` to `target`, skipping transform
    /// construction entirely when both describe the same system.
    pub fn between(source: &SpatialReference, target: &SpatialReference) -> Result<Self> {
        if source.is_same(target) {
            tracing::debug!(
                "{:?} and {:?} are the same system, skipping reprojection",
                source.input(),
                target.input()
            );
            return Ok(Reprojection::Identity);
        }
        CoordinateTransform::build(source, target).map(Reprojection::Transform)
    }

    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Reprojection::Identity => Ok((x, y)),
            Reprojection::Transform(transform) => transform.apply(x, y),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Reprojection::Identity)
    }
}
