//! Reprojection of rasters between coordinate reference systems.

use crate::{crs::edge_samples, BoundingBox, Crs, GeoRaster, GeoTransform, Result, Transformer};
use serde::{Deserialize, Serialize};

/// Resampling kernel used when warping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Take the source pixel whose cell contains the target pixel centre.
    #[default]
    Nearest,
}

/// Target grid for warping a `width` x `height` source grid with footprint
/// `bounds` into `dst_crs`.
///
/// The output pixel is square and sized so the target grid has roughly the
/// same number of pixels along its diagonal as the source grid. Returns the
/// transform with the output width and height, each at least 1.
pub fn default_transform(
    dst_crs: Crs,
    width: usize,
    height: usize,
    bounds: &BoundingBox,
) -> Result<(GeoTransform, usize, usize)> {
    let transformer = Transformer::new(bounds.crs(), dst_crs)?;

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (x, y) in edge_samples(bounds, crate::DEFAULT_DENSIFY_POINTS) {
        let (tx, ty) = transformer.transform(x, y)?;
        min_x = min_x.min(tx);
        min_y = min_y.min(ty);
        max_x = max_x.max(tx);
        max_y = max_y.max(ty);
    }
    let target = BoundingBox::new(min_x, min_y, max_x, max_y, dst_crs)?;

    let pixel_diagonal = ((width * width + height * height) as f64).sqrt();
    let world_diagonal = target.width().hypot(target.height());
    let resolution = world_diagonal / pixel_diagonal;

    let out_width = ((target.width() / resolution).round() as usize).max(1);
    let out_height = ((target.height() / resolution).round() as usize).max(1);

    let transform = GeoTransform::new(target.min_x(), target.max_y(), resolution, -resolution);
    Ok((transform, out_width, out_height))
}

/// Warp `src` into `dst_crs` on the grid chosen by [`default_transform`].
///
/// Target pixels whose centre maps outside the source, or cannot be mapped
/// at all, receive the source fill value. The no-data value and sample type
/// carry over unchanged. Warping into the source CRS returns a copy.
pub fn reproject(src: &GeoRaster, dst_crs: Crs, resampling: Resampling) -> Result<GeoRaster> {
    if src.crs() == dst_crs {
        return Ok(src.clone());
    }

    let (transform, width, height) =
        default_transform(dst_crs, src.width(), src.height(), &src.bounds()?)?;
    let inverse = Transformer::new(dst_crs, src.crs())?;
    let fill = src.fill_value();

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let (x, y) = transform.pixel_center(col, row);
            let value = match resampling {
                Resampling::Nearest => inverse
                    .transform(x, y)
                    .ok()
                    .and_then(|(sx, sy)| src.sample_nearest(sx, sy)),
            };
            data.push(value.unwrap_or(fill));
        }
    }

    GeoRaster::new(
        width,
        height,
        transform,
        dst_crs,
        src.nodata(),
        src.data_type(),
        data,
    )
}
