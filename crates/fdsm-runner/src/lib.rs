//! # fdsm-runner
//!
//! Entry adapters around [`fdsm_pipeline`] for the ways a foundation run is
//! triggered, plus a filesystem object store and the `fdsm` binary.
//!
//! - [`run_foundation_step`]: AOI upload in, foundation raster published,
//!   [`FoundationRecord`](fdsm_pipeline::FoundationRecord) out
//! - [`run_coregister_step`]: a foundation record in, registration results
//!   published
//! - [`handle_invocation`]: API or queue request, with either a static
//!   foundation or one assembled on the fly, followed by registration

mod api_handler;
mod coregister_step;
mod error;
mod foundation_step;
mod fs_store;

pub use api_handler::{handle_invocation, HandlerOutcome};
pub use coregister_step::{run_coregister_step, upload_results};
pub use error::RunnerError;
pub use foundation_step::{fetch_object, publish_foundation, run_foundation_step};
pub use fs_store::FsObjectStore;

use fdsm_pipeline::PipelineConfig;
use std::path::Path;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Load configuration from `path`, or defaults, then apply environment
/// overrides.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}
