//! Clipping the mosaic to the query box.

use crate::{FoundationError, Result};
use fdsm_raster::{read_geotiff, transform_bounds, write_geotiff, BoundingBox, GeoRaster};
use std::path::Path;
use tracing::info;

/// Pixel offsets closer than this to a grid line snap onto it.
const SNAP_TOLERANCE: f64 = 1e-6;

/// Crops a mosaic to a query box.
///
/// The box is reprojected into the mosaic CRS and the raster shrinks to the
/// pixels that box touches. Pixels inside that window whose centre lies
/// outside the box receive the fill value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cropper;

impl Cropper {
    /// Create a cropper.
    pub fn new() -> Self {
        Self
    }

    /// Crop the raster at `mosaic` to `query` and write it to `out`.
    pub fn crop(&self, mosaic: &Path, query: &BoundingBox, out: &Path) -> Result<GeoRaster> {
        let raster = read_geotiff(mosaic)?;
        let cropped = crop_raster(&raster, query)?;
        write_geotiff(&cropped, out)?;

        info!(
            output = %out.display(),
            width = cropped.width(),
            height = cropped.height(),
            crs = %cropped.crs(),
            "Mosaic cropped to query box"
        );
        Ok(cropped)
    }
}

/// Crop `raster` to `query`, which may be in any CRS.
pub fn crop_raster(raster: &GeoRaster, query: &BoundingBox) -> Result<GeoRaster> {
    let mask = transform_bounds(query, raster.crs())?;
    let transform = raster.transform();

    let (c0, r0) = transform.world_to_pixel(mask.min_x(), mask.max_y());
    let (c1, r1) = transform.world_to_pixel(mask.max_x(), mask.min_y());

    let col_start = snap_floor(c0.min(c1)).max(0.0);
    let col_end = snap_ceil(c0.max(c1)).min(raster.width() as f64);
    let row_start = snap_floor(r0.min(r1)).max(0.0);
    let row_end = snap_ceil(r0.max(r1)).min(raster.height() as f64);

    if col_end <= col_start || row_end <= row_start {
        return Err(FoundationError::NoOverlap);
    }

    let (col_off, row_off) = (col_start as usize, row_start as usize);
    let width = col_end as usize - col_off;
    let height = row_end as usize - row_off;
    let window = raster.window(col_off, row_off, width, height)?;

    let fill = window.fill_value();
    let window_transform = window.transform();
    let mut data = window.data().to_vec();
    for row in 0..height {
        for col in 0..width {
            let (x, y) = window_transform.pixel_center(col, row);
            if !mask.contains_point(x, y) {
                data[row * width + col] = fill;
            }
        }
    }

    Ok(GeoRaster::new(
        width,
        height,
        window_transform,
        window.crs(),
        window.nodata(),
        window.data_type(),
        data,
    )?)
}

fn snap_floor(v: f64) -> f64 {
    (v + SNAP_TOLERANCE).floor()
}

fn snap_ceil(v: f64) -> f64 {
    (v - SNAP_TOLERANCE).ceil()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fdsm_raster::{Crs, DataType, GeoTransform};

    const UTM: Crs = Crs::from_epsg(32618);

    fn ramp(width: usize, height: usize) -> GeoRaster {
        GeoRaster::new(
            width,
            height,
            GeoTransform::new(0.0, height as f64, 1.0, -1.0),
            UTM,
            Some(-9999.0),
            DataType::F32,
            (0..width * height).map(|v| v as f64).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_aligned_box_crops_exactly() {
        let raster = ramp(4, 4);
        let query = BoundingBox::new(1.0, 1.0, 3.0, 3.0, UTM).unwrap();
        let cropped = crop_raster(&raster, &query).unwrap();

        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.bounds().unwrap().to_array(), [1.0, 1.0, 3.0, 3.0]);
        assert_eq!(cropped.data(), &[5.0, 6.0, 9.0, 10.0]);
        assert_eq!(cropped.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_box_past_edge_clips_to_raster() {
        let raster = ramp(4, 4);
        let query = BoundingBox::new(2.0, -10.0, 50.0, 2.0, UTM).unwrap();
        let cropped = crop_raster(&raster, &query).unwrap();

        assert_eq!(cropped.bounds().unwrap().to_array(), [2.0, 0.0, 4.0, 2.0]);
        assert_eq!(cropped.data(), &[10.0, 11.0, 14.0, 15.0]);
    }

    #[test]
    fn test_partial_pixels_outside_box_are_filled() {
        let raster = ramp(4, 4);
        // Covers the centres of columns 1..=2 only; column 3 is touched but
        // its centre (3.5) is outside.
        let query = BoundingBox::new(1.0, 0.0, 3.2, 4.0, UTM).unwrap();
        let cropped = crop_raster(&raster, &query).unwrap();

        assert_eq!(cropped.dimensions(), (3, 4));
        for row in 0..4 {
            assert_eq!(cropped.get(2, row), -9999.0);
            assert_ne!(cropped.get(0, row), -9999.0);
        }
    }

    #[test]
    fn test_disjoint_box_is_no_overlap() {
        let raster = ramp(4, 4);
        let query = BoundingBox::new(10.0, 10.0, 11.0, 11.0, UTM).unwrap();
        assert!(matches!(crop_raster(&raster, &query), Err(FoundationError::NoOverlap)));
    }

    #[test]
    fn test_geographic_query_against_projected_mosaic() {
        let raster = GeoRaster::filled(
            400,
            400,
            GeoTransform::new(499_800.0, 4_400_300.0, 1.0, -1.0),
            UTM,
            Some(-9999.0),
            DataType::F32,
        )
        .unwrap();
        let native = BoundingBox::new(500_000.0, 4_400_000.0, 500_100.0, 4_400_100.0, UTM).unwrap();
        let query = transform_bounds(&native, Crs::WGS84).unwrap();

        let cropped = crop_raster(&raster, &query).unwrap();
        assert_eq!(cropped.crs(), UTM);

        let expected = transform_bounds(&query, UTM).unwrap();
        let bounds = cropped.bounds().unwrap();
        assert_relative_eq!(bounds.min_x(), expected.min_x(), epsilon = 1.0);
        assert_relative_eq!(bounds.max_x(), expected.max_x(), epsilon = 1.0);
        assert_relative_eq!(bounds.min_y(), expected.min_y(), epsilon = 1.0);
        assert_relative_eq!(bounds.max_y(), expected.max_y(), epsilon = 1.0);
    }
}
