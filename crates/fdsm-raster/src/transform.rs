//! North-up affine geotransforms.

use crate::{BoundingBox, Crs, Result};

/// Affine mapping from pixel (col, row) to world (x, y) coordinates.
///
/// Only axis-aligned grids are represented: `x = origin_x + col * pixel_width`
/// and `y = origin_y + row * pixel_height`. For the usual north-up raster
/// `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// World x of the top-left corner of pixel (0, 0).
    pub origin_x: f64,
    /// World y of the top-left corner of pixel (0, 0).
    pub origin_y: f64,
    /// Pixel size along x.
    pub pixel_width: f64,
    /// Pixel size along y (negative for north-up).
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a transform from origin and pixel sizes.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// World coordinate of a (fractional) pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y + row * self.pixel_height,
        )
    }

    /// World coordinate of the centre of pixel (col, row).
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel position of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// Absolute pixel sizes `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    /// Transform of the sub-grid whose top-left pixel is (col_off, row_off).
    pub fn offset(&self, col_off: usize, row_off: usize) -> Self {
        let (x, y) = self.pixel_to_world(col_off as f64, row_off as f64);
        Self::new(x, y, self.pixel_width, self.pixel_height)
    }

    /// Footprint of a `width` x `height` grid.
    pub fn bounds(&self, width: usize, height: usize, crs: Crs) -> Result<BoundingBox> {
        let (x0, y0) = self.pixel_to_world(0.0, 0.0);
        let (x1, y1) = self.pixel_to_world(width as f64, height as f64);
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1), crs)
    }
}
