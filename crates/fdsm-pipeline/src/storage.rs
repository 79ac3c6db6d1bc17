//! Object storage collaborator.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A bucket and key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl ObjectLocation {
    /// Create a location.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Final `/`-separated segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Fetches and publishes objects.
///
/// Implementations report failures as `FoundationError::Storage`; callers
/// fetching the AOI reclassify those as fetch failures.
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` into `dest_dir`, keeping the key's file name.
    fn get(&self, bucket: &str, key: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Upload the file at `local` to `bucket/key`.
    fn put(&self, local: &Path, bucket: &str, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(ObjectLocation::new("b", "dir/sub/site.tif").file_name(), "site.tif");
        assert_eq!(ObjectLocation::new("b", "site.tif").file_name(), "site.tif");
        assert_eq!(ObjectLocation::new("b", "k").to_string(), "b/k");
    }
}
