use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};

use crate::env::{ensure_initialized, reset_errors};
use crate::error::{QueryError, Result};

/// A resolved, canonical coordinate reference system.
///
/// Keeps the text it was resolved from for diagnostics. The underlying OGR
/// handle is released on drop.
#[derive(Clone)]
pub struct SpatialReference {
    input: String,
    srs: SpatialRef,
}

impl std::fmt::Debug for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialReference")
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

impl SpatialReference {
    /// Resolve any definition GDAL accepts: `EPSG:4326`, `WGS84`, WKT, PROJ
    /// strings, etc. Coordinates use traditional GIS axis order (x/lon first).
    pub fn resolve(input: &str) -> Result<Self> {
        Self::resolve_with_axis_order(input, true)
    }

    /// Like [`SpatialReference::resolve`], optionally keeping the authority's
    /// axis order (e.g. lat/lon for EPSG:4326).
    pub fn resolve_with_axis_order(input: &str, traditional_axis_order: bool) -> Result<Self> {
        ensure_initialized();

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QueryError::InvalidSpatialReference {
                input: input.to_string(),
                source: None,
            });
        }

        reset_errors();
        let mut srs = SpatialRef::from_definition(trimmed).map_err(|e| {
            QueryError::InvalidSpatialReference {
                input: input.to_string(),
                source: Some(e),
            }
        })?;
        if traditional_axis_order {
            srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        }

        tracing::debug!("Resolved spatial reference {:?}", input);
        Ok(Self {
            input: input.to_string(),
            srs,
        })
    }

    /// Wrap a spatial reference read from a raster. `label` is used in
    /// diagnostics in place of user input.
    pub(crate) fn from_raster(
        mut srs: SpatialRef,
        label: &str,
        traditional_axis_order: bool,
    ) -> Self {
        if traditional_axis_order {
            srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        }
        Self {
            input: label.to_string(),
            srs,
        }
    }

    /// The text this reference was resolved from.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Canonical WKT export.
    pub fn to_wkt(&self) -> Result<String> {
        self.srs
            .to_wkt()
            .map_err(|e| QueryError::InvalidSpatialReference {
                input: self.input.clone(),
                source: Some(e),
            })
    }

    /// Whether both references describe the same coordinate system.
    pub fn is_same(&self, other: &SpatialReference) -> bool {
        self.srs == other.srs
    }

    pub(crate) fn as_gdal(&self) -> &SpatialRef {
        &self.srs
    }
}
