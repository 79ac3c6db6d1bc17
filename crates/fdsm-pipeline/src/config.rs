//! Pipeline configuration.
//!
//! Configuration is a YAML document in which every field is optional:
//!
//! ```yaml
//! buffer_factor: 4.0
//! catalog:
//!   url: https://planetarycomputer.microsoft.com/api/stac/v1
//!   collection: 3dep-lidar-dsm
//!   asset_key: data
//!   signing: planetary-computer
//! download_workers: 4
//! storage:
//!   result_bucket: codem-aoi-registered-step
//! ```
//!
//! The `BUFFER_FACTOR` environment variable overrides `buffer_factor`.

use crate::{FoundationError, Result};
use fdsm_catalog::{DEFAULT_ASSET_KEY, DEFAULT_COLLECTION, PLANETARY_COMPUTER_STAC};
use fdsm_raster::{Crs, Resampling};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the buffer factor.
pub const BUFFER_FACTOR_ENV: &str = "BUFFER_FACTOR";

/// Default scale applied to the AOI footprint before querying the catalog.
pub const DEFAULT_BUFFER_FACTOR: f64 = 4.0;

/// Complete configuration for one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Scale applied to the AOI bounds about their centroid.
    pub buffer_factor: f64,
    /// Recognized AOI file extensions by kind.
    pub extensions: ExtensionTable,
    /// Tile catalog settings.
    pub catalog: CatalogConfig,
    /// EPSG code of the CRS used to exchange bounding boxes. Catalog searches
    /// take EPSG:4326 only, so this is the only value that validates.
    pub interchange_epsg: u16,
    /// Resampling used when reconciling tile CRSs.
    pub resampling: Resampling,
    /// Concurrent tile downloads; 1 downloads sequentially.
    pub download_workers: usize,
    /// Timeout for each catalog, signing and download request.
    pub request_timeout_secs: u64,
    /// Parent directory for scratch space; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
    /// Object store buckets used by the entry adapters.
    pub storage: StorageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_factor: DEFAULT_BUFFER_FACTOR,
            extensions: ExtensionTable::default(),
            catalog: CatalogConfig::default(),
            interchange_epsg: Crs::WGS84.epsg(),
            resampling: Resampling::Nearest,
            download_workers: 1,
            request_timeout_secs: 60,
            scratch_root: None,
            storage: StorageConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| FoundationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FoundationError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(BUFFER_FACTOR_ENV) {
            self.buffer_factor = value.trim().parse().map_err(|_| {
                FoundationError::InvalidConfig(format!("{BUFFER_FACTOR_ENV}={value} is not a number"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges.
    ///
    /// Buffer factors in (0, 1] are allowed and shrink or keep the AOI box;
    /// zero, negative and non-finite factors cannot produce a valid box.
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_factor.is_finite() || self.buffer_factor <= 0.0 {
            return Err(FoundationError::InvalidConfig(format!(
                "buffer_factor must be finite and positive, got {}",
                self.buffer_factor
            )));
        }
        if self.download_workers == 0 {
            return Err(FoundationError::InvalidConfig(
                "download_workers must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(FoundationError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.interchange_epsg != Crs::WGS84.epsg() {
            return Err(FoundationError::InvalidConfig(format!(
                "interchange_epsg must be {}, got {}",
                Crs::WGS84.epsg(),
                self.interchange_epsg
            )));
        }
        if self.catalog.collection.is_empty() || self.catalog.asset_key.is_empty() {
            return Err(FoundationError::InvalidConfig(
                "catalog collection and asset_key must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// The interchange CRS.
    pub fn interchange_crs(&self) -> Crs {
        Crs::from_epsg(self.interchange_epsg)
    }

    /// Per-request network timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Tile catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// STAC API root.
    pub url: String,
    /// Collection holding the elevation tiles.
    pub collection: String,
    /// Asset key of the tile GeoTIFF.
    pub asset_key: String,
    /// How asset URLs are signed before download.
    pub signing: SigningMode,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: PLANETARY_COMPUTER_STAC.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            asset_key: DEFAULT_ASSET_KEY.to_string(),
            signing: SigningMode::PlanetaryComputer,
        }
    }
}

/// Asset URL signing scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningMode {
    /// Planetary Computer SAS tokens.
    #[default]
    PlanetaryComputer,
    /// Assets are public.
    None,
}

/// Buckets used by the entry adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// AOI bucket assumed when a trigger names only a key.
    pub aoi_bucket: String,
    /// Bucket receiving foundation and registration outputs.
    pub result_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            aoi_bucket: "codem-aoi-step".to_string(),
            result_bucket: "codem-aoi-registered-step".to_string(),
        }
    }
}

/// Recognized file extensions per AOI kind, lower case with leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionTable {
    /// Raster surface models.
    pub dsm: Vec<String>,
    /// Triangle meshes.
    pub mesh: Vec<String>,
    /// Point clouds.
    pub point_cloud: Vec<String>,
}

impl Default for ExtensionTable {
    fn default() -> Self {
        let owned = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            dsm: owned(&[".tif", ".tiff"]),
            mesh: owned(&[".ply", ".obj"]),
            point_cloud: owned(&[".las", ".laz", ".bpf"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_factor, 4.0);
        assert_eq!(config.catalog.collection, "3dep-lidar-dsm");
        assert_eq!(config.catalog.asset_key, "data");
        assert_eq!(config.interchange_crs(), Crs::WGS84);
        assert_eq!(config.download_workers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "buffer_factor: 2.5\ncatalog:\n  signing: none\ndownload_workers: 3\n",
        )
        .unwrap();
        assert_eq!(config.buffer_factor, 2.5);
        assert_eq!(config.catalog.signing, SigningMode::None);
        assert_eq!(config.catalog.collection, DEFAULT_COLLECTION);
        assert_eq!(config.download_workers, 3);
        assert_eq!(config.extensions, ExtensionTable::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            PipelineConfig::from_yaml_str("bufer_factor: 2.0\n"),
            Err(FoundationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_buffer_factor_validation() {
        for bad in ["0", "-1.5", ".nan", ".inf"] {
            let yaml = format!("buffer_factor: {bad}\n");
            assert!(
                PipelineConfig::from_yaml_str(&yaml).is_err(),
                "{bad} should be rejected"
            );
        }
        // Shrinking is a legitimate choice
        assert!(PipelineConfig::from_yaml_str("buffer_factor: 0.5\n").is_ok());
        assert!(PipelineConfig::from_yaml_str("buffer_factor: 1\n").is_ok());
    }

    #[test]
    fn test_env_override() {
        let config = PipelineConfig::default()
            .with_overrides_from(|key| (key == BUFFER_FACTOR_ENV).then(|| "1.5".to_string()))
            .unwrap();
        assert_eq!(config.buffer_factor, 1.5);

        let err = PipelineConfig::default()
            .with_overrides_from(|_| Some("wide".to_string()))
            .unwrap_err();
        assert!(matches!(err, FoundationError::InvalidConfig(_)));

        let untouched = PipelineConfig::default().with_overrides_from(|_| None).unwrap();
        assert_eq!(untouched.buffer_factor, DEFAULT_BUFFER_FACTOR);
    }

    #[test]
    fn test_interchange_crs_must_be_wgs84() {
        let err = PipelineConfig::from_yaml_str("interchange_epsg: 32618\n").unwrap_err();
        assert!(matches!(err, FoundationError::InvalidConfig(ref msg) if msg.contains("32618")));

        let config = PipelineConfig::from_yaml_str("interchange_epsg: 4326\n").unwrap();
        assert_eq!(config.interchange_crs(), Crs::WGS84);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(PipelineConfig::from_yaml_str("download_workers: 0\n").is_err());
    }
}
