//! Error types for foundation assembly.

use fdsm_catalog::CatalogError;
use fdsm_raster::RasterError;
use thiserror::Error;

/// Errors that end a foundation assembly or one of its adapters.
///
/// Every variant is fatal for the invocation. Nothing is retried internally;
/// redelivery is left to whatever triggered the run.
#[derive(Debug, Error)]
pub enum FoundationError {
    /// AOI format is not a supported raster type.
    #[error("Unsupported file type '{extension}': {reason}")]
    UnsupportedFileType {
        /// File extension including the dot, or empty when there is none.
        extension: String,
        /// Why the type is rejected.
        reason: String,
    },

    /// A trigger carried other than exactly one AOI object.
    #[error("Expected exactly one AOI object per invocation, received {count}")]
    BatchSize {
        /// Number of objects in the trigger.
        count: usize,
    },

    /// The catalog returned no tiles for the query box.
    #[error("No foundation tiles found for the query box")]
    EmptyTileSet,

    /// Downloading a tile or the AOI failed.
    #[error("Failed to fetch {target}: {reason}")]
    FetchFailure {
        /// What was being fetched.
        target: String,
        /// Reason for failure.
        reason: String,
    },

    /// A coordinate transform failed while reprojecting.
    #[error("CRS reprojection failed: {0}")]
    CrsReprojection(String),

    /// The query box does not intersect the mosaic.
    #[error("Query box does not overlap the foundation mosaic")]
    NoOverlap,

    /// A configuration value is out of range or unreadable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A catalog item lacks the configured asset.
    #[error("Catalog item {item} has no '{asset}' asset")]
    MissingAsset {
        /// Item identifier.
        item: String,
        /// Asset key.
        asset: String,
    },

    /// Catalog search failed.
    #[error("Catalog query failed: {0}")]
    Catalog(CatalogError),

    /// Raster read, write or geometry error.
    #[error("Raster error: {0}")]
    Raster(RasterError),

    /// Object store failure other than fetching the AOI.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The trigger payload matches no known invocation shape.
    #[error("Invalid invocation payload: {0}")]
    InvalidInvocation(String),

    /// The co-registration collaborator failed.
    #[error("Co-registration failed: {0}")]
    Coregistration(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FoundationError {
    /// Classify an error raised while downloading tiles.
    pub fn fetch(target: impl Into<String>, err: CatalogError) -> Self {
        match err {
            CatalogError::MissingAsset { item, asset } => FoundationError::MissingAsset { item, asset },
            other => FoundationError::FetchFailure {
                target: target.into(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<RasterError> for FoundationError {
    fn from(err: RasterError) -> Self {
        match err {
            RasterError::Projection { .. } | RasterError::UnknownCrs(_) => {
                FoundationError::CrsReprojection(err.to_string())
            }
            other => FoundationError::Raster(other),
        }
    }
}

impl From<CatalogError> for FoundationError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::MissingAsset { item, asset } => FoundationError::MissingAsset { item, asset },
            other => FoundationError::Catalog(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_errors_map_to_reprojection() {
        let err: FoundationError = RasterError::UnknownCrs(1).into();
        assert!(matches!(err, FoundationError::CrsReprojection(_)));

        let err: FoundationError = RasterError::Projection {
            from: 32618,
            to: 4326,
            reason: "out of domain".into(),
        }
        .into();
        assert!(matches!(err, FoundationError::CrsReprojection(ref msg) if msg.contains("out of domain")));

        let err: FoundationError = RasterError::InvalidGeoTiff("no tags".into()).into();
        assert!(matches!(err, FoundationError::Raster(_)));
    }

    #[test]
    fn test_download_errors_map_to_fetch_failure() {
        let err = FoundationError::fetch(
            "tiles",
            CatalogError::Download {
                url: "https://h/a.tif".into(),
                reason: "HTTP 500".into(),
            },
        );
        assert!(matches!(err, FoundationError::FetchFailure { ref target, .. } if target == "tiles"));
    }

    #[test]
    fn test_missing_asset_keeps_identity() {
        let err: FoundationError = CatalogError::MissingAsset {
            item: "x".into(),
            asset: "data".into(),
        }
        .into();
        assert!(matches!(err, FoundationError::MissingAsset { .. }));
    }
}
