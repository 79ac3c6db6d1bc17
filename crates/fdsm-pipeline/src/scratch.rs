//! Invocation-scoped scratch space.

use crate::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A scratch directory owned by one pipeline invocation.
///
/// Everything under it is removed when the value is dropped, on success and
/// on every error path alike.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a scratch directory under `root`, or the system temp directory.
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("fdsm-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Scratch directory created");
        Ok(Self { dir })
    }

    /// Root of the scratch area.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create (if needed) and return a named subdirectory.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let scratch = ScratchDir::new(Some(root.path())).unwrap();
        let tiles = scratch.subdir("tiles").unwrap();
        std::fs::write(tiles.join("a.tif"), b"x").unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(root.path()));

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_removed_when_stage_fails() {
        fn failing_stage(scratch: &ScratchDir) -> Result<()> {
            std::fs::write(scratch.path().join("partial.tif"), b"x")?;
            Err(crate::FoundationError::EmptyTileSet)
        }

        let scratch = ScratchDir::new(None).unwrap();
        let path = scratch.path().to_path_buf();
        let result = failing_stage(&scratch);
        drop(scratch);

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
