//! Coordinate reference systems and point transforms.
//!
//! A CRS is identified by its EPSG code. Definitions come from the
//! `crs-definitions` database and transforms run through `proj4rs`, so no
//! libproj is needed at runtime.

use crate::{BoundingBox, RasterError, Result};
use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of intermediate points sampled along each edge when transforming bounds.
pub const DEFAULT_DENSIFY_POINTS: usize = 21;

/// A coordinate reference system identified by EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(u16);

impl Crs {
    /// WGS84 geographic (EPSG:4326), the interchange CRS.
    pub const WGS84: Crs = Crs(4326);

    /// Create a CRS from an EPSG code.
    pub const fn from_epsg(code: u16) -> Self {
        Self(code)
    }

    /// The EPSG code.
    pub const fn epsg(&self) -> u16 {
        self.0
    }

    /// PROJ string for this CRS, if it is in the definitions database.
    pub fn proj_string(&self) -> Option<&'static str> {
        crs_definitions::from_code(self.0).map(|def| def.proj4)
    }

    /// Whether this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Some(proj) => proj.contains("+proj=longlat"),
            None => self.0 == 4326 || (4000..5000).contains(&self.0),
        }
    }

    fn proj(&self) -> Result<Proj> {
        let definition = self.proj_string().ok_or(RasterError::UnknownCrs(self.0))?;
        Proj::from_proj_string(definition).map_err(|e| RasterError::Projection {
            from: self.0,
            to: self.0,
            reason: format!("invalid definition: {e:?}"),
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Projections resolved once for a source/target pair.
struct Projections {
    source: Proj,
    target: Proj,
    source_geographic: bool,
    target_geographic: bool,
}

/// A reusable point transform between two CRSs.
///
/// Parsing PROJ definitions is comparatively expensive, so warping code
/// builds one `Transformer` and calls [`Transformer::transform`] per pixel.
/// Transforming between identical CRSs is the identity and never consults
/// the definitions database.
pub struct Transformer {
    source: Crs,
    target: Crs,
    projections: Option<Projections>,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl Transformer {
    /// Build a transformer from `source` to `target`.
    pub fn new(source: Crs, target: Crs) -> Result<Self> {
        if source == target {
            return Ok(Self {
                source,
                target,
                projections: None,
            });
        }

        let projections = Projections {
            source: source.proj()?,
            target: target.proj()?,
            source_geographic: source.is_geographic(),
            target_geographic: target.is_geographic(),
        };

        Ok(Self {
            source,
            target,
            projections: Some(projections),
        })
    }

    /// Source CRS.
    pub fn source(&self) -> Crs {
        self.source
    }

    /// Target CRS.
    pub fn target(&self) -> Crs {
        self.target
    }

    /// Whether this transform is the identity.
    pub fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    /// Transform a single point. Geographic coordinates are in degrees.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some(p) = &self.projections else {
            return Ok((x, y));
        };

        // proj4rs works in radians for geographic systems
        let mut point = if p.source_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(&p.source, &p.target, &mut point)
            .map_err(|e| self.error(format!("({x}, {y}): {e:?}")))?;

        let (out_x, out_y) = if p.target_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(self.error(format!("({x}, {y}) has no finite image")));
        }

        Ok((out_x, out_y))
    }

    /// Transform a bounding box, sampling `densify` extra points per edge.
    ///
    /// The result is the envelope of every transformed sample, so it always
    /// contains the transformed corners.
    pub fn transform_bounds(&self, bbox: &BoundingBox, densify: usize) -> Result<BoundingBox> {
        if bbox.crs() != self.source {
            return Err(RasterError::CrsMismatch {
                expected: self.source.epsg(),
                actual: bbox.crs().epsg(),
            });
        }
        if self.is_identity() {
            return Ok(*bbox);
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for (x, y) in edge_samples(bbox, densify) {
            let (tx, ty) = self.transform(x, y)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }

        BoundingBox::new(min_x, min_y, max_x, max_y, self.target)
    }

    fn error(&self, reason: String) -> RasterError {
        RasterError::Projection {
            from: self.source.epsg(),
            to: self.target.epsg(),
            reason,
        }
    }
}

/// Points along the boundary of `bbox`: the four corners plus `densify`
/// evenly spaced points on each edge.
pub fn edge_samples(bbox: &BoundingBox, densify: usize) -> Vec<(f64, f64)> {
    let steps = densify + 1;
    let mut points = Vec::with_capacity(4 * steps);

    for i in 0..steps {
        let t = i as f64 / steps as f64;
        let x = bbox.min_x() + t * bbox.width();
        let y = bbox.min_y() + t * bbox.height();
        // bottom edge west to east, top edge east to west
        points.push((x, bbox.min_y()));
        points.push((bbox.max_x() - t * bbox.width(), bbox.max_y()));
        // right edge south to north, left edge north to south
        points.push((bbox.max_x(), y));
        points.push((bbox.min_x(), bbox.max_y() - t * bbox.height()));
    }

    points
}

/// Transform `bbox` into `target`, densifying edges with the default sample count.
pub fn transform_bounds(bbox: &BoundingBox, target: Crs) -> Result<BoundingBox> {
    Transformer::new(bbox.crs(), target)?.transform_bounds(bbox, DEFAULT_DENSIFY_POINTS)
}
