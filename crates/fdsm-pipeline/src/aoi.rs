//! AOI classification and query box estimation.

use crate::config::{ExtensionTable, PipelineConfig};
use crate::{FoundationError, Result};
use fdsm_raster::{read_info, transform_bounds, BoundingBox, Crs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// The kinds of AOI dataset the dispatcher recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AoiKind {
    /// Raster digital surface model.
    Dsm,
    /// Triangle mesh. Recognized, but no footprint estimator exists yet.
    Mesh,
    /// Point cloud. Recognized, but no footprint estimator exists yet.
    PointCloud,
}

impl AoiKind {
    /// Classify a path by extension (case-insensitive).
    pub fn classify(path: &Path, table: &ExtensionTable) -> Result<Self> {
        let extension = extension_of(path);
        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(&extension));

        if matches(&table.dsm) {
            Ok(AoiKind::Dsm)
        } else if matches(&table.mesh) {
            Ok(AoiKind::Mesh)
        } else if matches(&table.point_cloud) {
            Ok(AoiKind::PointCloud)
        } else {
            Err(FoundationError::UnsupportedFileType {
                extension,
                reason: "not a recognized DSM, mesh or point cloud extension".to_string(),
            })
        }
    }
}

impl fmt::Display for AoiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AoiKind::Dsm => f.write_str("dsm"),
            AoiKind::Mesh => f.write_str("mesh"),
            AoiKind::PointCloud => f.write_str("point cloud"),
        }
    }
}

/// Extension with its leading dot, or an empty string.
fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Computes the catalog query box for an AOI.
#[derive(Debug, Clone)]
pub struct BoundingBoxEstimator {
    extensions: ExtensionTable,
    buffer_factor: f64,
    interchange: Crs,
}

impl BoundingBoxEstimator {
    /// Create an estimator.
    pub fn new(extensions: ExtensionTable, buffer_factor: f64, interchange: Crs) -> Self {
        Self {
            extensions,
            buffer_factor,
            interchange,
        }
    }

    /// Create an estimator from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.extensions.clone(),
            config.buffer_factor,
            config.interchange_crs(),
        )
    }

    /// Buffer factor in use.
    pub fn buffer_factor(&self) -> f64 {
        self.buffer_factor
    }

    /// Estimate the query box for the AOI at `path`, in the interchange CRS.
    pub fn estimate(&self, path: &Path) -> Result<BoundingBox> {
        let kind = AoiKind::classify(path, &self.extensions)?;
        match kind {
            AoiKind::Dsm => self.estimate_dsm(path),
            AoiKind::Mesh | AoiKind::PointCloud => Err(FoundationError::UnsupportedFileType {
                extension: extension_of(path),
                reason: format!("{kind} AOIs are not supported yet"),
            }),
        }
    }

    fn estimate_dsm(&self, path: &Path) -> Result<BoundingBox> {
        let info = read_info(path)?;
        let native = info.transform.bounds(info.width, info.height, info.crs)?;
        let bbox = buffered_query_box(&native, self.buffer_factor, self.interchange)?;

        info!(
            aoi = %path.display(),
            crs = %info.crs,
            buffer_factor = self.buffer_factor,
            bbox = ?bbox.to_array(),
            "Estimated foundation query box"
        );
        Ok(bbox)
    }
}

/// Scale `native` about its centroid by `buffer_factor` on both axes, then
/// take the envelope of the scaled box in `interchange`.
pub fn buffered_query_box(
    native: &BoundingBox,
    buffer_factor: f64,
    interchange: Crs,
) -> Result<BoundingBox> {
    let scaled = native.scale(buffer_factor)?;
    Ok(transform_bounds(&scaled, interchange)?)
}
