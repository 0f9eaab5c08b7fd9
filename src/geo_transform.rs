//! Affine geotransforms between pixel/line and georeferenced space.
//!
//! Coefficients follow GDAL ordering:
//!
//! ```text
//! geo_x = c[0] + c[1] * pixel + c[2] * line
//! geo_y = c[3] + c[4] * pixel + c[5] * line
//! ```

use crate::error::{QueryError, Result};

/// Integer raster indices of the cell holding a fractional pixel/line position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoordinate {
    pub pixel: isize,
    pub line: isize,
}

impl PixelCoordinate {
    pub fn new(pixel: isize, line: isize) -> Self {
        Self { pixel, line }
    }

    /// Whether the coordinate addresses a cell of a `width` x `height` raster.
    pub fn is_within(&self, width: usize, height: usize) -> bool {
        self.pixel >= 0
            && self.line >= 0
            && (self.pixel as usize) < width
            && (self.line as usize) < height
    }
}

/// Forward mapping, pixel/line to georeferenced coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub coefficients: [f64; 6],
}

/// Inverse mapping, georeferenced coordinates to pixel/line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseGeoTransform {
    pub coefficients: [f64; 6],
}

impl From<gdal::GeoTransform> for GeoTransform {
    fn from(coefficients: gdal::GeoTransform) -> Self {
        Self { coefficients }
    }
}

impl GeoTransform {
    pub fn new(coefficients: [f64; 6]) -> Self {
        Self { coefficients }
    }

    /// Map a (fractional) pixel/line position to georeferenced coordinates.
    pub fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        affine(&self.coefficients, pixel, line)
    }

    /// Closed-form inverse of the 2x2 linear part plus translation.
    ///
    /// Fails with [`QueryError::SingularGeoTransform`] when the determinant
    /// vanishes relative to the magnitude of the linear coefficients.
    pub fn invert(&self) -> Result<InverseGeoTransform> {
        let [a0, a1, a2, a3, a4, a5] = self.coefficients;
        let singular = || QueryError::SingularGeoTransform {
            coefficients: self.coefficients,
        };

        if self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(singular());
        }

        // North-up rasters: avoid the rounding of the general form
        if a2 == 0.0 && a4 == 0.0 {
            if a1 == 0.0 || a5 == 0.0 {
                return Err(singular());
            }
            return Ok(InverseGeoTransform {
                coefficients: [-a0 / a1, 1.0 / a1, 0.0, -a3 / a5, 0.0, 1.0 / a5],
            });
        }

        let det = a1 * a5 - a2 * a4;
        let magnitude = a1.abs().max(a2.abs()).max(a4.abs()).max(a5.abs());
        if det.abs() <= 1e-10 * magnitude * magnitude {
            return Err(singular());
        }

        let inv_det = 1.0 / det;
        Ok(InverseGeoTransform {
            coefficients: [
                (a2 * a3 - a0 * a5) * inv_det,
                a5 * inv_det,
                -a2 * inv_det,
                (-a1 * a3 + a0 * a4) * inv_det,
                -a4 * inv_det,
                a1 * inv_det,
            ],
        })
    }
}

impl InverseGeoTransform {
    /// Fractional pixel/line position of a georeferenced point.
    pub fn apply(&self, geo_x: f64, geo_y: f64) -> (f64, f64) {
        affine(&self.coefficients, geo_x, geo_y)
    }

    /// Integer pixel/line containing a georeferenced point.
    ///
    /// Both axes are floored toward negative infinity, so a point on a cell
    /// boundary belongs to the cell starting there and `-0.25` maps to `-1`.
    /// A position within a few ulps of a whole number, scaled by the size of
    /// the terms that produced it, counts as that boundary: the corner of
    /// a cell can compute as `-1e-13` or `138.99999999999997` and still maps to
    /// the cell it starts.
    pub fn to_pixel(&self, geo_x: f64, geo_y: f64) -> PixelCoordinate {
        let c = &self.coefficients;
        let (pixel, line) = self.apply(geo_x, geo_y);
        let pixel_terms = c[0].abs() + (c[1] * geo_x).abs() + (c[2] * geo_y).abs();
        let line_terms = c[3].abs() + (c[4] * geo_x).abs() + (c[5] * geo_y).abs();
        PixelCoordinate {
            pixel: floor_index(pixel, pixel_terms),
            line: floor_index(line, line_terms),
        }
    }
}

fn affine(c: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (c[0] + c[1] * x + c[2] * y, c[3] + c[4] * x + c[5] * y)
}

// Rounding slack, in ulps of the summed magnitudes behind a position.
const SNAP_ULPS: f64 = 1024.0;

// NaN has no cell; map it far out of range instead of letting `as` yield 0.
fn floor_index(value: f64, terms: f64) -> isize {
    if value.is_nan() {
        return isize::MIN;
    }
    let nearest = value.round();
    let tolerance = SNAP_ULPS * f64::EPSILON * terms.max(1.0);
    if (value - nearest).abs() <= tolerance {
        nearest as isize
    } else {
        value.floor() as isize
    }
}
