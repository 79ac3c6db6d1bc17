//! # fdsm-pipeline
//!
//! Assembly of a foundation DSM for an area of interest: a reference
//! elevation surface built from catalog tiles and cropped to a buffered
//! footprint of the AOI.
//!
//! ## Stages
//!
//! 1. [`BoundingBoxEstimator`]: AOI bounds, buffered and moved to WGS84
//! 2. [`CatalogQuery`](fdsm_catalog::CatalogQuery): tiles intersecting that box
//! 3. [`TileFetcher`](fdsm_catalog::TileFetcher): signed downloads into scratch
//! 4. [`CrsReconciler`]: minority-CRS tiles reprojected to the majority CRS
//! 5. [`MosaicBuilder`]: one raster over the union of the tiles
//! 6. [`Cropper`]: the mosaic clipped to the query box
//!
//! [`FoundationPipeline`] runs them in order inside a [`ScratchDir`] that is
//! removed when the run ends.
//!
//! ## Example
//!
//! ```no_run
//! use fdsm_pipeline::{FoundationPipeline, PipelineConfig, ScratchDir};
//! use std::path::Path;
//!
//! let config = PipelineConfig::default().with_env_overrides()?;
//! let pipeline = FoundationPipeline::from_config(config)?;
//!
//! let scratch = ScratchDir::new(None)?;
//! let foundation = pipeline.assemble(Path::new("site.tif"), &scratch)?;
//! std::fs::copy(&foundation.path, "site-foundation.tif")?;
//! # Ok::<(), fdsm_pipeline::FoundationError>(())
//! ```

pub mod aoi;
pub mod config;
pub mod coregister;
pub mod crop;
mod error;
pub mod invocation;
pub mod metrics;
pub mod mosaic;
pub mod pipeline;
pub mod reconcile;
pub mod record;
mod scratch;
pub mod storage;

pub use aoi::{buffered_query_box, AoiKind, BoundingBoxEstimator};
pub use config::{
    CatalogConfig, ExtensionTable, PipelineConfig, SigningMode, StorageConfig, BUFFER_FACTOR_ENV,
    DEFAULT_BUFFER_FACTOR,
};
pub use coregister::{CoregisterConfig, Coregistrator, RegistrationOutput};
pub use crop::{crop_raster, Cropper};
pub use error::FoundationError;
pub use invocation::{Invocation, InvocationParams};
pub use mosaic::{merge_rasters, MosaicBuilder};
pub use pipeline::{Foundation, FoundationPipeline};
pub use reconcile::{majority_crs, CrsReconciler, ReconciledTiles};
pub use record::{sha256_file, FoundationRecord, OutputNames};
pub use scratch::ScratchDir;
pub use storage::{ObjectLocation, ObjectStore};

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, FoundationError>;
