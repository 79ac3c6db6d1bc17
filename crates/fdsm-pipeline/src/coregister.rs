//! Co-registration collaborator interface.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings passed through to the co-registration engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoregisterConfig {
    /// Minimum registration resolution in metres.
    pub min_resolution: f64,
    /// Whether to solve for scale in addition to rotation and translation.
    pub solve_scale: bool,
}

impl Default for CoregisterConfig {
    fn default() -> Self {
        Self {
            min_resolution: 1.0,
            solve_scale: true,
        }
    }
}

impl CoregisterConfig {
    /// Apply per-invocation overrides.
    pub fn with_overrides(mut self, min_resolution: Option<f64>, solve_scale: Option<bool>) -> Self {
        if let Some(res) = min_resolution {
            self.min_resolution = res;
        }
        if let Some(scale) = solve_scale {
            self.solve_scale = scale;
        }
        self
    }
}

/// What a co-registration run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutput {
    /// The registered AOI dataset.
    pub registered_file: PathBuf,
    /// Directory of auxiliary outputs (reports, logs) uploaded verbatim.
    pub result_dir: PathBuf,
}

/// Aligns an AOI dataset to a foundation raster.
pub trait Coregistrator: Send + Sync {
    /// Register `aoi` against `foundation`.
    fn register(
        &self,
        foundation: &Path,
        aoi: &Path,
        config: &CoregisterConfig,
    ) -> Result<RegistrationOutput>;
}
