//! Axis-aligned bounding boxes tagged with their CRS.

use crate::{Crs, RasterError, Result};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in a given CRS.
///
/// Construction enforces `min_x < max_x` and `min_y < max_y` with finite
/// coordinates, so every `BoundingBox` in circulation is non-degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    crs: Crs,
}

#[derive(Deserialize)]
struct RawBoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    crs: Crs,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = RasterError;

    fn try_from(raw: RawBoundingBox) -> Result<Self> {
        BoundingBox::new(raw.min_x, raw.min_y, raw.max_x, raw.max_y, raw.crs)
    }
}

impl BoundingBox {
    /// Create a bounding box, rejecting degenerate or non-finite extents.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Crs) -> Result<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(RasterError::DegenerateBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
            crs,
        })
    }

    /// Minimum x (west).
    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    /// Minimum y (south).
    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    /// Maximum x (east).
    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    /// Maximum y (north).
    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    /// CRS the coordinates are expressed in.
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Extent along x.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along y.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Centre point.
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Corners in the order SW, SE, NE, NW.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    /// `[west, south, east, north]`, the order catalogs expect.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Scale about the centroid: each half-extent is multiplied by `factor`.
    ///
    /// Any finite positive factor is valid; factors below 1 shrink the box.
    pub fn scale(&self, factor: f64) -> Result<Self> {
        let (cx, cy) = self.centroid();
        let half_w = self.width() / 2.0 * factor;
        let half_h = self.height() / 2.0 * factor;
        Self::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h, self.crs)
    }

    /// Whether a point lies inside or on the boundary.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether `other` lies entirely inside this box. Boxes in different
    /// CRSs never contain each other.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.crs == other.crs
            && other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Overlapping region, or `None` when the boxes are disjoint, touch only
    /// along an edge, or live in different CRSs.
    pub fn intersection(&self, other: &BoundingBox) -> Option<Self> {
        if self.crs != other.crs {
            return None;
        }
        Self::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
            self.crs,
        )
        .ok()
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> Result<Self> {
        if self.crs != other.crs {
            return Err(RasterError::CrsMismatch {
                expected: self.crs.epsg(),
                actual: other.crs.epsg(),
            });
        }
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
            self.crs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wgs(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox::new(min_x, min_y, max_x, max_y, Crs::WGS84).unwrap()
    }

    #[test]
    fn test_rejects_degenerate() {
        assert!(BoundingBox::new(1.0, 0.0, 1.0, 1.0, Crs::WGS84).is_err());
        assert!(BoundingBox::new(0.0, 2.0, 1.0, 1.0, Crs::WGS84).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f64::NAN, 1.0, Crs::WGS84).is_err());
    }

    #[test]
    fn test_scale_about_centroid() {
        let scaled = wgs(10.0, 20.0, 11.0, 21.0).scale(4.0).unwrap();
        assert_eq!(scaled.to_array(), [8.5, 18.5, 12.5, 22.5]);
    }

    #[test]
    fn test_scale_below_one_shrinks() {
        let scaled = wgs(0.0, 0.0, 4.0, 2.0).scale(0.5).unwrap();
        assert_eq!(scaled.to_array(), [1.0, 0.5, 3.0, 1.5]);
    }

    #[test]
    fn test_scale_by_zero_is_degenerate() {
        assert!(wgs(0.0, 0.0, 1.0, 1.0).scale(0.0).is_err());
    }

    #[test]
    fn test_intersection_and_union() {
        let a = wgs(0.0, 0.0, 2.0, 2.0);
        let b = wgs(1.0, 1.0, 3.0, 3.0);
        assert_eq!(a.intersection(&b).unwrap().to_array(), [1.0, 1.0, 2.0, 2.0]);
        assert_eq!(a.union(&b).unwrap().to_array(), [0.0, 0.0, 3.0, 3.0]);

        let far = wgs(5.0, 5.0, 6.0, 6.0);
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_contains_requires_same_crs() {
        let a = wgs(0.0, 0.0, 2.0, 2.0);
        let inner = BoundingBox::new(0.5, 0.5, 1.0, 1.0, Crs::from_epsg(3857)).unwrap();
        assert!(!a.contains(&inner));
        assert!(a.contains(&wgs(0.5, 0.5, 1.0, 1.0)));
    }

    #[test]
    fn test_raw_conversion_validates() {
        let raw = RawBoundingBox {
            min_x: 1.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 1.0,
            crs: Crs::WGS84,
        };
        assert!(BoundingBox::try_from(raw).is_err());
    }
}
