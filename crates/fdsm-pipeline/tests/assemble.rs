//! End-to-end assembly against an in-process catalog and tile server.

use fdsm_catalog::{
    CatalogError, CatalogItem, CatalogQuery, NoSigning, TileDownloader, TileFetcher,
};
use fdsm_pipeline::{
    FoundationError, FoundationPipeline, PipelineConfig, ScratchDir, SigningMode,
};
use fdsm_raster::{
    read_geotiff, transform_bounds, write_geotiff, BoundingBox, Crs, DataType, GeoRaster,
    GeoTransform,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const UTM18: Crs = Crs::from_epsg(32618);
const UTM17: Crs = Crs::from_epsg(32617);
const RES: f64 = 2.0;

/// Returns a fixed item list regardless of the query box.
struct FixedCatalog {
    items: Vec<CatalogItem>,
}

impl CatalogQuery for FixedCatalog {
    fn search(&self, _: &str, bbox: &BoundingBox) -> fdsm_catalog::Result<Vec<CatalogItem>> {
        assert_eq!(bbox.crs(), Crs::WGS84);
        Ok(self.items.clone())
    }
}

/// Serves `https://tiles.test/<name>` from a local directory.
struct DirDownloader {
    root: Arc<TempDir>,
}

impl TileDownloader for DirDownloader {
    fn download(&self, url: &str, dest: &Path) -> fdsm_catalog::Result<u64> {
        let name = url.trim_start_matches("https://tiles.test/");
        let source = self.root.path().join(name);
        if !source.exists() {
            return Err(CatalogError::Download {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            });
        }
        Ok(std::fs::copy(source, dest)?)
    }
}

fn raster(bounds: &BoundingBox, value: f64) -> GeoRaster {
    let width = (bounds.width() / RES).round() as usize;
    let height = (bounds.height() / RES).round() as usize;
    GeoRaster::new(
        width,
        height,
        GeoTransform::new(bounds.min_x(), bounds.max_y(), RES, -RES),
        bounds.crs(),
        Some(-9999.0),
        DataType::F32,
        vec![value; width * height],
    )
    .unwrap()
}

struct Fixture {
    remote: Arc<TempDir>,
    aoi: PathBuf,
    _aoi_dir: TempDir,
}

/// An AOI at (500000, 4400000)-(500100, 4400100) in UTM 18N, a west tile in
/// UTM 18N and an east tile stored in UTM 17N.
fn fixture() -> Fixture {
    let aoi_dir = TempDir::new().unwrap();
    let aoi = aoi_dir.path().join("site.tif");
    let aoi_bounds = BoundingBox::new(500_000.0, 4_400_000.0, 500_100.0, 4_400_100.0, UTM18).unwrap();
    write_geotiff(&raster(&aoi_bounds, 50.0), &aoi).unwrap();

    let remote = TempDir::new().unwrap();
    let west = BoundingBox::new(499_600.0, 4_399_600.0, 500_200.0, 4_400_600.0, UTM18).unwrap();
    write_geotiff(&raster(&west, 10.0), remote.path().join("west.tif")).unwrap();

    let east_utm18 = BoundingBox::new(500_200.0, 4_399_600.0, 500_600.0, 4_400_600.0, UTM18).unwrap();
    let east = transform_bounds(&east_utm18, UTM17).unwrap();
    write_geotiff(&raster(&east, 20.0), remote.path().join("east.tif")).unwrap();

    Fixture {
        remote: Arc::new(remote),
        aoi,
        _aoi_dir: aoi_dir,
    }
}

fn pipeline(fixture: &Fixture, names: &[&str], workers: usize) -> FoundationPipeline {
    let items = names
        .iter()
        .map(|name| CatalogItem::new(*name, format!("https://tiles.test/{name}")))
        .collect();
    let config = PipelineConfig {
        download_workers: workers,
        ..PipelineConfig::default()
    };
    let fetcher = TileFetcher::new(
        Box::new(NoSigning),
        Box::new(DirDownloader {
            root: Arc::clone(&fixture.remote),
        }),
    );
    FoundationPipeline::new(config, Box::new(FixedCatalog { items }), fetcher).unwrap()
}

#[test]
fn test_two_crs_tiles_assemble_in_majority_crs() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &["west.tif", "east.tif"], 1);
    let scratch = ScratchDir::new(None).unwrap();

    let foundation = pipeline.assemble(&fixture.aoi, &scratch).unwrap();
    assert_eq!(foundation.tile_count, 2);
    assert_eq!(foundation.crs, UTM18);
    assert_eq!(foundation.reprojected, 1);
    assert_eq!(foundation.downloads.tiles_downloaded, 2);

    let output = read_geotiff(&foundation.path).unwrap();
    assert_eq!(output.crs(), UTM18);
    assert_eq!(output.nodata(), Some(-9999.0));
    assert_eq!(output.data_type(), DataType::F32);

    // Extent is the buffered AOI box brought back into UTM, to within a pixel
    let expected = transform_bounds(&foundation.bbox, UTM18).unwrap();
    let actual = output.bounds().unwrap();
    assert!((actual.min_x() - expected.min_x()).abs() <= RES);
    assert!((actual.max_x() - expected.max_x()).abs() <= RES);
    assert!((actual.min_y() - expected.min_y()).abs() <= RES);
    assert!((actual.max_y() - expected.max_y()).abs() <= RES);

    // The query box spans the seam between the two tiles
    assert!(output.data().contains(&10.0));
    assert!(output.data().contains(&20.0));
}

#[test]
fn test_buffered_box_contains_aoi() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &["west.tif"], 1);
    let bbox = pipeline.estimate(&fixture.aoi).unwrap();

    let aoi_wgs84 = transform_bounds(
        &BoundingBox::new(500_000.0, 4_400_000.0, 500_100.0, 4_400_100.0, UTM18).unwrap(),
        Crs::WGS84,
    )
    .unwrap();
    assert!(bbox.contains(&aoi_wgs84));
}

#[test]
fn test_rerun_is_byte_identical() {
    let fixture = fixture();
    let run = |workers| {
        let pipeline = pipeline(&fixture, &["west.tif", "east.tif"], workers);
        let scratch = ScratchDir::new(None).unwrap();
        let foundation = pipeline.assemble(&fixture.aoi, &scratch).unwrap();
        std::fs::read(&foundation.path).unwrap()
    };

    let first = run(1);
    assert_eq!(first, run(1));
    assert_eq!(first, run(4));
}

#[test]
fn test_single_tile_skips_merge() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &["west.tif"], 1);
    let scratch = ScratchDir::new(None).unwrap();

    let foundation = pipeline.assemble(&fixture.aoi, &scratch).unwrap();
    assert_eq!(foundation.reprojected, 0);
    assert!(!scratch.path().join("merged.tif").exists());
    let output = read_geotiff(&foundation.path).unwrap();
    assert!(output.data().iter().all(|&v| v == 10.0 || v == -9999.0));
}

#[test]
fn test_no_catalog_hits_is_empty_tile_set() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &[], 1);
    let scratch = ScratchDir::new(None).unwrap();
    assert!(matches!(
        pipeline.assemble(&fixture.aoi, &scratch),
        Err(FoundationError::EmptyTileSet)
    ));
}

#[test]
fn test_failed_download_aborts_and_scratch_is_released() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &["west.tif", "missing.tif"], 2);
    let scratch = ScratchDir::new(None).unwrap();
    let scratch_path = scratch.path().to_path_buf();

    let err = pipeline.assemble(&fixture.aoi, &scratch).unwrap_err();
    assert!(matches!(err, FoundationError::FetchFailure { .. }));

    drop(scratch);
    assert!(!scratch_path.exists());
}

#[test]
fn test_buffer_factor_override() {
    let fixture = fixture();
    let pipeline = pipeline(&fixture, &["west.tif", "east.tif"], 1);

    let scratch = ScratchDir::new(None).unwrap();
    let narrow = pipeline.assemble_with(&fixture.aoi, &scratch, Some(1.0)).unwrap();
    let wide_scratch = ScratchDir::new(None).unwrap();
    let wide = pipeline.assemble(&fixture.aoi, &wide_scratch).unwrap();
    assert!(wide.bbox.contains(&narrow.bbox));

    assert!(matches!(
        pipeline.assemble_with(&fixture.aoi, &scratch, Some(-1.0)),
        Err(FoundationError::InvalidConfig(_))
    ));
}

#[test]
fn test_default_signing_is_planetary_computer() {
    assert_eq!(
        PipelineConfig::default().catalog.signing,
        SigningMode::PlanetaryComputer
    );
}
