//! Error types for the catalog crate.

use thiserror::Error;

/// Errors from catalog search, URL signing and tile download.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP transport error.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("Catalog request to {url} returned HTTP {status}: {body}")]
    Status {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Malformed JSON in a catalog or signing response.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Search box not expressed in geographic WGS84.
    #[error("Catalog search box must be in EPSG:4326, got EPSG:{0}")]
    SearchCrs(u16),

    /// A catalog item lacks the asset the pipeline downloads.
    #[error("Catalog item {item} has no '{asset}' asset")]
    MissingAsset {
        /// Item identifier.
        item: String,
        /// Asset key that was looked up.
        asset: String,
    },

    /// Signing a URL failed.
    #[error("URL signing failed: {0}")]
    Signing(String),

    /// An asset URL from which no file name can be derived.
    #[error("Invalid asset URL: {0}")]
    InvalidUrl(String),

    /// Downloading a tile failed.
    #[error("Failed to download {url}: {reason}")]
    Download {
        /// Tile URL (signed URLs are reported without their query string).
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// I/O error writing a downloaded tile.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The download worker pool could not be created.
    #[error("Failed to start download workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
