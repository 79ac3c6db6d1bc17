//! Co-registration step: a published foundation in, registration results out.

use crate::foundation_step::fetch_object;
use fdsm_pipeline::{
    CoregisterConfig, Coregistrator, FoundationError, FoundationRecord, ObjectStore, Result,
    ScratchDir,
};
use std::path::Path;
use tracing::info;

/// Register the AOI of `record` against its foundation and upload every
/// result file next to the foundation. Returns the uploaded keys.
pub fn run_coregister_step(
    record: &FoundationRecord,
    store: &dyn ObjectStore,
    coregistrator: &dyn Coregistrator,
    config: &CoregisterConfig,
    scratch_root: Option<&Path>,
) -> Result<Vec<String>> {
    let scratch = ScratchDir::new(scratch_root)?;
    let aoi = fetch_object(store, &record.aoi_location(), &scratch.subdir("aoi")?)?;
    let foundation = fetch_object(
        store,
        &record.foundation_location(),
        &scratch.subdir("foundation")?,
    )?;

    let output = coregistrator.register(&foundation, &aoi, config)?;
    info!(registered = %output.registered_file.display(), "Registered AOI to foundation");

    upload_results(
        &output.result_dir,
        store,
        &record.result_bucket,
        &record.result_directory,
    )
}

/// Upload each regular file in `dir` as `<directory>/<name>`, in name order.
pub fn upload_results(
    dir: &Path,
    store: &dyn ObjectStore,
    bucket: &str,
    directory: &str,
) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    let mut keys = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FoundationError::Storage(format!("non UTF-8 result file {}", path.display()))
            })?;
        let key = format!("{directory}/{name}");
        store.put(&path, bucket, &key)?;
        info!(bucket, key = %key, "Uploaded registration result");
        keys.push(key);
    }
    Ok(keys)
}
