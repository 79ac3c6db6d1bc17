//! Output naming and the record handed to the registration stage.

use crate::storage::ObjectLocation;
use crate::Result;
use chrono::{DateTime, Utc};
use fdsm_raster::BoundingBox;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::Path;

/// Where the outputs of one run are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    /// `<aoi-stem>-<YYYYmmdd_HHMMSS>`.
    pub result_directory: String,
    /// `<aoi-stem>-foundation.tif`.
    pub foundation_filename: String,
}

impl OutputNames {
    /// Names for the AOI at `aoi_key`, stamped with `at`.
    pub fn new(aoi_key: &str, at: DateTime<Utc>) -> Self {
        let stem = aoi_stem(aoi_key);
        Self {
            result_directory: format!("{stem}-{}", at.format("%Y%m%d_%H%M%S")),
            foundation_filename: format!("{stem}-foundation.tif"),
        }
    }

    /// Key of `file` inside the result directory.
    pub fn key_for(&self, file: &str) -> String {
        format!("{}/{file}", self.result_directory)
    }

    /// Key of the foundation raster.
    pub fn foundation_key(&self) -> String {
        self.key_for(&self.foundation_filename)
    }
}

/// File stem of the last segment of an object key.
pub fn aoi_stem(key: &str) -> String {
    Path::new(key)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| key.to_string())
}

/// A published foundation raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationRecord {
    /// Bucket holding the AOI.
    pub aoi_bucket: String,
    /// AOI object key.
    #[serde(alias = "aoi_filename")]
    pub aoi_key: String,
    /// Bucket holding the outputs.
    pub result_bucket: String,
    /// Output directory within the result bucket.
    pub result_directory: String,
    /// Foundation file name within the output directory.
    pub foundation_filename: String,
    /// Full key of the foundation raster.
    pub foundation_key: String,
    /// Catalog query box in the interchange CRS.
    pub bbox: BoundingBox,
    /// Number of catalog tiles merged.
    pub tile_count: usize,
    /// EPSG code of the foundation raster.
    pub crs_epsg: u16,
    /// Hex SHA-256 of the foundation raster.
    pub sha256: String,
}

impl FoundationRecord {
    /// Location of the AOI.
    pub fn aoi_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.aoi_bucket, &self.aoi_key)
    }

    /// Location of the foundation raster.
    pub fn foundation_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.result_bucket, &self.foundation_key)
    }

    /// Key for an auxiliary output file in the same directory.
    pub fn result_key(&self, file: &str) -> String {
        format!("{}/{file}", self.result_directory)
    }
}

/// Hex SHA-256 digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
