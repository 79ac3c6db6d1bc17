//! Merging CRS-consistent tiles into one raster.

use crate::{FoundationError, Result};
use fdsm_raster::{read_geotiff, write_geotiff, BoundingBox, GeoRaster, GeoTransform, RasterError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the merged raster inside the output directory.
pub const MOSAIC_FILE_NAME: &str = "merged.tif";

/// Merges a reconciled tile set into a single raster.
///
/// Overlaps resolve first-in-order: a pixel keeps the value of the earliest
/// tile that has a valid sample there, and later tiles only fill pixels that
/// are still empty. Output resolution, no-data value and sample type come
/// from the first tile.
#[derive(Debug, Clone, Copy, Default)]
pub struct MosaicBuilder;

impl MosaicBuilder {
    /// Create a builder.
    pub fn new() -> Self {
        Self
    }

    /// Merge `tiles` into `out_dir/merged.tif`.
    ///
    /// A single tile is already a mosaic and its path is returned unchanged.
    pub fn build(&self, tiles: &[PathBuf], out_dir: &Path) -> Result<PathBuf> {
        match tiles {
            [] => Err(FoundationError::EmptyTileSet),
            [only] => {
                debug!(tile = %only.display(), "Single tile, skipping merge");
                Ok(only.clone())
            }
            _ => {
                let rasters = tiles
                    .iter()
                    .map(read_geotiff)
                    .collect::<std::result::Result<Vec<_>, RasterError>>()?;
                let merged = merge_rasters(&rasters)?;
                let out = out_dir.join(MOSAIC_FILE_NAME);
                write_geotiff(&merged, &out)?;

                info!(
                    tiles = tiles.len(),
                    width = merged.width(),
                    height = merged.height(),
                    crs = %merged.crs(),
                    "Tiles merged"
                );
                Ok(out)
            }
        }
    }
}

/// Merge in-memory rasters that share a CRS.
pub fn merge_rasters(rasters: &[GeoRaster]) -> Result<GeoRaster> {
    let (first, rest) = rasters.split_first().ok_or(FoundationError::EmptyTileSet)?;
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let mut extent = first.bounds()?;
    for raster in rest {
        if raster.crs() != first.crs() {
            return Err(RasterError::CrsMismatch {
                expected: first.crs().epsg(),
                actual: raster.crs().epsg(),
            }
            .into());
        }
        extent = extent.union(&raster.bounds()?)?;
    }

    let (res_x, res_y) = first.resolution();
    let width = ((extent.width() / res_x).round() as usize).max(1);
    let height = ((extent.height() / res_y).round() as usize).max(1);
    let transform = GeoTransform::new(extent.min_x(), extent.max_y(), res_x, -res_y);

    let mut merged = GeoRaster::filled(
        width,
        height,
        transform,
        first.crs(),
        first.nodata(),
        first.data_type(),
    )?
    .into_data();

    let data_type = first.data_type();
    let mut covered = vec![false; merged.len()];

    for raster in rasters {
        let Some((cols, rows)) = pixel_span(&transform, width, height, &raster.bounds()?) else {
            continue;
        };
        for row in rows {
            for col in cols.clone() {
                let idx = row * width + col;
                if covered[idx] {
                    continue;
                }
                let (x, y) = transform.pixel_center(col, row);
                if let Some(value) = raster.sample_nearest(x, y) {
                    if !raster.is_nodata(value) {
                        merged[idx] = data_type.quantize(value);
                        covered[idx] = true;
                    }
                }
            }
        }
    }

    Ok(GeoRaster::new(
        width,
        height,
        transform,
        first.crs(),
        first.nodata(),
        data_type,
        merged,
    )?)
}

/// Destination column and row ranges whose pixel centres may fall inside
/// `footprint`.
fn pixel_span(
    transform: &GeoTransform,
    width: usize,
    height: usize,
    footprint: &BoundingBox,
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let (c0, r0) = transform.world_to_pixel(footprint.min_x(), footprint.max_y());
    let (c1, r1) = transform.world_to_pixel(footprint.max_x(), footprint.min_y());

    let col_start = c0.min(c1).floor().max(0.0) as usize;
    let col_end = (c0.max(c1).ceil().max(0.0) as usize).min(width);
    let row_start = r0.min(r1).floor().max(0.0) as usize;
    let row_end = (r0.max(r1).ceil().max(0.0) as usize).min(height);

    (col_start < col_end && row_start < row_end).then(|| (col_start..col_end, row_start..row_end))
}
