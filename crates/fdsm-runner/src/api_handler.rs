//! Combined handler for API requests and bucket notifications.

use crate::coregister_step::upload_results;
use crate::foundation_step::{fetch_object, publish_foundation};
use chrono::{DateTime, Utc};
use fdsm_pipeline::{
    CoregisterConfig, Coregistrator, FoundationPipeline, InvocationParams, ObjectLocation,
    ObjectStore, OutputNames, Result, ScratchDir,
};
use serde::Serialize;
use tracing::info;

/// Where a combined run left its outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerOutcome {
    /// Bucket holding the outputs.
    pub result_bucket: String,
    /// Output directory within the bucket.
    pub result_directory: String,
    /// Foundation the AOI was registered against.
    pub foundation: ObjectLocation,
    /// Whether the foundation was assembled in this run.
    pub assembled: bool,
    /// Keys of the uploaded registration results.
    pub uploaded: Vec<String>,
}

/// Register the AOI of `params`, assembling a foundation first unless the
/// parameters name one.
pub fn handle_invocation(
    params: &InvocationParams,
    pipeline: &FoundationPipeline,
    store: &dyn ObjectStore,
    coregistrator: &dyn Coregistrator,
    base: &CoregisterConfig,
    now: DateTime<Utc>,
) -> Result<HandlerOutcome> {
    let config = pipeline.config();
    let result_bucket = config.storage.result_bucket.clone();
    let names = OutputNames::new(&params.aoi_key, now);

    let scratch = ScratchDir::new(config.scratch_root.as_deref())?;
    let aoi = fetch_object(store, &params.aoi_location(), &scratch.subdir("aoi")?)?;

    let (foundation_path, foundation, assembled) = match &params.foundation {
        Some(location) => {
            let path = fetch_object(store, location, &scratch.subdir("foundation")?)?;
            info!(foundation = %location, "Using static foundation");
            (path, location.clone(), false)
        }
        None => {
            let built = pipeline.assemble_with(&aoi, &scratch, params.buffer_factor)?;
            let record = publish_foundation(&built, params, &names, &result_bucket, store)?;
            (built.path, record.foundation_location(), true)
        }
    };

    let coregister = base.with_overrides(params.min_resolution, params.solve_scale);
    let output = coregistrator.register(&foundation_path, &aoi, &coregister)?;
    let uploaded = upload_results(
        &output.result_dir,
        store,
        &result_bucket,
        &names.result_directory,
    )?;
    info!(
        directory = %names.result_directory,
        files = uploaded.len(),
        "Registration complete"
    );

    Ok(HandlerOutcome {
        result_bucket,
        result_directory: names.result_directory,
        foundation,
        assembled,
        uploaded,
    })
}
