//! Filesystem-backed object store.

use fdsm_pipeline::{FoundationError, ObjectStore, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Maps bucket `b` to `<root>/b/` and key `k` to the relative path `k`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of `bucket/key`. Keys escaping the bucket are rejected.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        check_segment("bucket", bucket)?;
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(FoundationError::Storage(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

fn check_segment(what: &str, value: &str) -> Result<()> {
    let plain = !value.is_empty()
        && Path::new(value)
            .components()
            .eq(std::iter::once(Component::Normal(value.as_ref())));
    if plain {
        Ok(())
    } else {
        Err(FoundationError::Storage(format!("invalid {what} '{value}'")))
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str, dest_dir: &Path) -> Result<PathBuf> {
        let source = self.object_path(bucket, key)?;
        let name = source
            .file_name()
            .ok_or_else(|| FoundationError::Storage(format!("invalid object key '{key}'")))?;
        let dest = dest_dir.join(name);

        std::fs::copy(&source, &dest)
            .map_err(|e| FoundationError::Storage(format!("get {bucket}/{key}: {e}")))?;
        debug!(bucket, key, dest = %dest.display(), "Object fetched");
        Ok(dest)
    }

    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<()> {
        let dest = self.object_path(bucket, key)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FoundationError::Storage(format!("put {bucket}/{key}: {e}")))?;
        }
        std::fs::copy(local, &dest)
            .map_err(|e| FoundationError::Storage(format!("put {bucket}/{key}: {e}")))?;
        debug!(bucket, key, source = %local.display(), "Object stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_then_get() {
        let root = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let store = FsObjectStore::new(root.path());

        let local = work.path().join("upload.tif");
        std::fs::write(&local, b"dsm").unwrap();
        store.put(&local, "results", "run-1/site-foundation.tif").unwrap();
        assert!(root.path().join("results/run-1/site-foundation.tif").exists());

        let fetched = store
            .get("results", "run-1/site-foundation.tif", work.path())
            .unwrap();
        assert_eq!(fetched, work.path().join("site-foundation.tif"));
        assert_eq!(std::fs::read(fetched).unwrap(), b"dsm");
    }

    #[test]
    fn test_escaping_keys_rejected() {
        let store = FsObjectStore::new("/srv/objects");
        for key in ["../etc/passwd", "/abs/key.tif", "a/../../b", ""] {
            assert!(
                matches!(store.object_path("bucket", key), Err(FoundationError::Storage(_))),
                "{key}"
            );
        }
        assert!(store.object_path("..", "a.tif").is_err());
        assert!(store.object_path("a/b", "a.tif").is_err());
        assert!(store.object_path("bucket", "dir/a.tif").is_ok());
    }

    #[test]
    fn test_missing_object_is_storage_error() {
        let root = TempDir::new().unwrap();
        let store = FsObjectStore::new(root.path());
        assert!(matches!(
            store.get("aoi", "nothing.tif", root.path()),
            Err(FoundationError::Storage(_))
        ));
    }
}
