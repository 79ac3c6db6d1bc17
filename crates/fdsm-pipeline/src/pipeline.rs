//! The assembled foundation pipeline.

use crate::aoi::BoundingBoxEstimator;
use crate::config::{PipelineConfig, SigningMode};
use crate::crop::Cropper;
use crate::metrics::{metric_defs, record_counter, record_run, record_stage};
use crate::mosaic::MosaicBuilder;
use crate::reconcile::CrsReconciler;
use crate::scratch::ScratchDir;
use crate::{FoundationError, Result};
use fdsm_catalog::{
    CatalogQuery, DownloadStats, HttpDownloader, NoSigning, PlanetaryComputerSigner, StacClient,
    TileFetcher, UrlSigner,
};
use fdsm_raster::{BoundingBox, Crs};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// File name of the cropped foundation inside the scratch directory.
pub const FOUNDATION_FILE_NAME: &str = "cropped.tif";

/// A foundation raster assembled for one AOI.
#[derive(Debug, Clone, PartialEq)]
pub struct Foundation {
    /// The cropped raster, inside the scratch directory.
    pub path: PathBuf,
    /// Catalog query box in the interchange CRS.
    pub bbox: BoundingBox,
    /// Number of catalog tiles merged.
    pub tile_count: usize,
    /// CRS of the foundation raster.
    pub crs: Crs,
    /// Tiles that had to be reprojected before merging.
    pub reprojected: usize,
    /// Download statistics.
    pub downloads: DownloadStats,
}

/// Estimation, query, fetch, reconcile, merge and crop in one linear pass.
///
/// Collaborators are passed in, so the catalog and the downloader can be
/// replaced in tests.
pub struct FoundationPipeline {
    config: PipelineConfig,
    estimator: BoundingBoxEstimator,
    catalog: Box<dyn CatalogQuery>,
    fetcher: TileFetcher,
    reconciler: CrsReconciler,
    mosaic: MosaicBuilder,
    cropper: Cropper,
}

impl std::fmt::Debug for FoundationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoundationPipeline")
            .field("config", &self.config)
            .field("fetcher", &self.fetcher)
            .finish()
    }
}

impl FoundationPipeline {
    /// Create a pipeline with explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        catalog: Box<dyn CatalogQuery>,
        fetcher: TileFetcher,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            estimator: BoundingBoxEstimator::from_config(&config),
            reconciler: CrsReconciler::new(config.resampling),
            mosaic: MosaicBuilder::new(),
            cropper: Cropper::new(),
            fetcher: fetcher.with_workers(config.download_workers),
            catalog,
            config,
        })
    }

    /// Create a pipeline talking to the configured STAC catalog over HTTP.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let catalog = StacClient::new(&config.catalog.url, &config.catalog.asset_key, timeout)?;
        let signer: Box<dyn UrlSigner> = match config.catalog.signing {
            SigningMode::PlanetaryComputer => Box::new(PlanetaryComputerSigner::new(timeout)?),
            SigningMode::None => Box::new(NoSigning),
        };
        let fetcher = TileFetcher::new(signer, Box::new(HttpDownloader::new(timeout)?));
        Self::new(config, Box::new(catalog), fetcher)
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Estimate the catalog query box for an AOI.
    pub fn estimate(&self, aoi: &Path) -> Result<BoundingBox> {
        self.estimator.estimate(aoi)
    }

    /// Assemble the foundation for the AOI at `aoi`.
    ///
    /// All intermediate files, and the returned raster, live in `scratch`.
    pub fn assemble(&self, aoi: &Path, scratch: &ScratchDir) -> Result<Foundation> {
        self.assemble_with(aoi, scratch, None)
    }

    /// Like [`assemble`](Self::assemble), with an optional buffer factor
    /// overriding the configured one.
    pub fn assemble_with(
        &self,
        aoi: &Path,
        scratch: &ScratchDir,
        buffer_factor: Option<f64>,
    ) -> Result<Foundation> {
        let result = self.run(aoi, scratch, buffer_factor);
        record_run(if result.is_ok() { "success" } else { "failure" });
        result
    }

    fn run(&self, aoi: &Path, scratch: &ScratchDir, buffer_factor: Option<f64>) -> Result<Foundation> {
        let bbox = timed("estimate", || match buffer_factor {
            Some(factor) => {
                let overridden = PipelineConfig {
                    buffer_factor: factor,
                    ..self.config.clone()
                };
                overridden.validate()?;
                BoundingBoxEstimator::from_config(&overridden).estimate(aoi)
            }
            None => self.estimator.estimate(aoi),
        })?;

        let items = timed("query", || {
            Ok(self.catalog.search(&self.config.catalog.collection, &bbox)?)
        })?;
        record_counter(&metric_defs::CATALOG_ITEMS, items.len() as u64);
        info!(
            collection = %self.config.catalog.collection,
            items = items.len(),
            "Catalog query complete"
        );
        if items.is_empty() {
            warn!(bbox = ?bbox.to_array(), "No foundation tiles cover the query box");
            return Err(FoundationError::EmptyTileSet);
        }

        let tiles_dir = scratch.subdir("tiles")?;
        let fetched = timed("fetch", || {
            self.fetcher
                .fetch_all(&items, &tiles_dir)
                .map_err(|e| FoundationError::fetch("foundation tiles", e))
        })?;
        record_counter(&metric_defs::TILES_DOWNLOADED, fetched.stats.tiles_downloaded as u64);
        record_counter(&metric_defs::BYTES_DOWNLOADED, fetched.stats.bytes_downloaded);
        info!(
            tiles = fetched.stats.tiles_downloaded,
            bytes = fetched.stats.bytes_downloaded,
            "Foundation tiles downloaded"
        );

        let reprojected_dir = scratch.subdir("reprojected")?;
        let reconciled = timed("reconcile", || {
            self.reconciler.reconcile(&fetched.paths, &reprojected_dir)
        })?;
        let mosaic = timed("mosaic", || self.mosaic.build(&reconciled.paths, scratch.path()))?;

        let out = scratch.path().join(FOUNDATION_FILE_NAME);
        let cropped = timed("crop", || self.cropper.crop(&mosaic, &bbox, &out))?;

        Ok(Foundation {
            path: out,
            bbox,
            tile_count: items.len(),
            crs: cropped.crs(),
            reprojected: reconciled.reprojected,
            downloads: fetched.stats,
        })
    }
}

fn timed<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    record_stage(stage, start.elapsed().as_secs_f64());
    result
}
