//! Error types for the entry adapters and CLI.

use fdsm_pipeline::FoundationError;
use thiserror::Error;

/// Errors surfaced at the invocation boundary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The pipeline or one of its collaborators failed.
    #[error(transparent)]
    Foundation(#[from] FoundationError),

    /// Output could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local I/O error outside the pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
