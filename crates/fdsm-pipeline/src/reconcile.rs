//! Bringing a tile set onto one CRS.

use crate::metrics::{metric_defs, record_counter};
use crate::{FoundationError, Result};
use fdsm_raster::{read_geotiff, read_info, reproject, write_geotiff, Crs, Resampling};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A tile set whose members all share one CRS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledTiles {
    /// Tile paths in input order.
    pub paths: Vec<PathBuf>,
    /// The shared CRS.
    pub crs: Crs,
    /// How many tiles had to be reprojected.
    pub reprojected: usize,
}

/// The most frequent CRS; ties go to the one seen first.
pub fn majority_crs(crss: &[Crs]) -> Option<Crs> {
    let mut counts: Vec<(Crs, usize)> = Vec::new();
    for crs in crss {
        match counts.iter_mut().find(|(c, _)| c == crs) {
            Some((_, n)) => *n += 1,
            None => counts.push((*crs, 1)),
        }
    }

    let mut best: Option<(Crs, usize)> = None;
    for (crs, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((crs, n));
        }
    }
    best.map(|(crs, _)| crs)
}

/// Reprojects minority-CRS tiles into the majority CRS.
///
/// Only CRS differences are reconciled; tiles with differing resolutions
/// keep them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrsReconciler {
    resampling: Resampling,
}

impl CrsReconciler {
    /// Create a reconciler.
    pub fn new(resampling: Resampling) -> Self {
        Self { resampling }
    }

    /// Reconcile `tiles`. Tiles already in the majority CRS are returned as
    /// the same path; the others are written into `out_dir`, which must not
    /// hold any of the input tiles.
    pub fn reconcile(&self, tiles: &[PathBuf], out_dir: &Path) -> Result<ReconciledTiles> {
        let crss = tiles
            .iter()
            .map(|path| Ok(read_info(path)?.crs))
            .collect::<Result<Vec<_>>>()?;
        let target = majority_crs(&crss).ok_or(FoundationError::EmptyTileSet)?;

        let mut paths = Vec::with_capacity(tiles.len());
        let mut reprojected = 0;
        for (index, (path, crs)) in tiles.iter().zip(&crss).enumerate() {
            if *crs == target {
                paths.push(path.clone());
                continue;
            }
            debug!(tile = %path.display(), from = %crs, to = %target, "Reprojecting tile");
            let out = reprojected_path(out_dir, index, path);
            paths.push(self.reproject_tile(path, target, out)?);
            reprojected += 1;
        }

        record_counter(&metric_defs::TILES_REPROJECTED, reprojected as u64);
        info!(tiles = tiles.len(), reprojected, crs = %target, "Tile CRSs reconciled");

        Ok(ReconciledTiles {
            paths,
            crs: target,
            reprojected,
        })
    }

    fn reproject_tile(&self, path: &Path, target: Crs, out: PathBuf) -> Result<PathBuf> {
        let src = read_geotiff(path)?;
        let warped = reproject(&src, target, self.resampling)?;
        write_geotiff(&warped, &out)?;
        Ok(out)
    }
}

/// `<out_dir>/<index>_<stem>_reprojected.tif` for the tile at position
/// `index` of a batch. The index keeps `x.tif` and `x.tiff` apart.
pub fn reprojected_path(out_dir: &Path, index: usize, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir.join(format!("{index}_{stem}_reprojected.tif"))
}
