//! Foundation step: AOI in, published foundation raster out.

use chrono::{DateTime, Utc};
use fdsm_pipeline::{
    sha256_file, Foundation, FoundationError, FoundationPipeline, FoundationRecord,
    InvocationParams, ObjectLocation, ObjectStore, OutputNames, Result, ScratchDir,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Fetch the AOI named by `params`, assemble its foundation and publish it
/// to the configured result bucket.
///
/// `now` stamps the result directory.
pub fn run_foundation_step(
    params: &InvocationParams,
    pipeline: &FoundationPipeline,
    store: &dyn ObjectStore,
    now: DateTime<Utc>,
) -> Result<FoundationRecord> {
    let scratch = ScratchDir::new(pipeline.config().scratch_root.as_deref())?;
    let aoi = fetch_object(store, &params.aoi_location(), &scratch.subdir("aoi")?)?;

    let foundation = pipeline.assemble_with(&aoi, &scratch, params.buffer_factor)?;
    let names = OutputNames::new(&params.aoi_key, now);
    publish_foundation(
        &foundation,
        params,
        &names,
        &pipeline.config().storage.result_bucket,
        store,
    )
}

/// Upload an assembled foundation and describe it.
pub fn publish_foundation(
    foundation: &Foundation,
    params: &InvocationParams,
    names: &OutputNames,
    result_bucket: &str,
    store: &dyn ObjectStore,
) -> Result<FoundationRecord> {
    let foundation_key = names.foundation_key();
    let sha256 = sha256_file(&foundation.path)?;
    store.put(&foundation.path, result_bucket, &foundation_key)?;
    info!(
        bucket = result_bucket,
        key = %foundation_key,
        tiles = foundation.tile_count,
        "Uploaded foundation DSM"
    );

    Ok(FoundationRecord {
        aoi_bucket: params.aoi_bucket.clone(),
        aoi_key: params.aoi_key.clone(),
        result_bucket: result_bucket.to_string(),
        result_directory: names.result_directory.clone(),
        foundation_filename: names.foundation_filename.clone(),
        foundation_key,
        bbox: foundation.bbox,
        tile_count: foundation.tile_count,
        crs_epsg: foundation.crs.epsg(),
        sha256,
    })
}

/// Download an input object. Any failure is a fetch failure of that object.
pub fn fetch_object(
    store: &dyn ObjectStore,
    location: &ObjectLocation,
    dest_dir: &Path,
) -> Result<PathBuf> {
    let path = store
        .get(&location.bucket, &location.key, dest_dir)
        .map_err(|e| FoundationError::FetchFailure {
            target: location.to_string(),
            reason: match e {
                FoundationError::Storage(reason) => reason,
                other => other.to_string(),
            },
        })?;
    info!(object = %location, "Downloaded input object");
    Ok(path)
}
