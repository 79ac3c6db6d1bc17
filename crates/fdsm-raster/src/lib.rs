//! # fdsm-raster
//!
//! Single-band elevation rasters and the geometry needed to move them
//! between coordinate reference systems.
//!
//! ## Overview
//!
//! - [`BoundingBox`]: an axis-aligned extent tagged with its [`Crs`]
//! - [`GeoRaster`]: an in-memory grid of samples with a [`GeoTransform`],
//!   CRS, optional no-data value and the on-disk [`DataType`]
//! - [`read_geotiff`] / [`write_geotiff`]: the GeoTIFF subset used by
//!   3DEP DSM products (one band, north-up grid, EPSG-coded CRS)
//! - [`Transformer`] / [`transform_bounds`]: point and extent transforms
//!   backed by `proj4rs`
//! - [`reproject`]: nearest-neighbour warping onto a default target grid
//!
//! ## Example
//!
//! ```no_run
//! use fdsm_raster::{read_geotiff, reproject, write_geotiff, Crs, Resampling};
//!
//! let tile = read_geotiff("USGS_1M_18_x50y443.tif")?;
//! let utm = reproject(&tile, Crs::from_epsg(32618), Resampling::Nearest)?;
//! write_geotiff(&utm, "USGS_1M_18_x50y443_reprojected.tif")?;
//! # Ok::<(), fdsm_raster::RasterError>(())
//! ```

mod bbox;
pub mod crs;
mod error;
mod geotiff;
mod raster;
mod transform;
mod warp;

pub use bbox::BoundingBox;
pub use crs::{transform_bounds, Crs, Transformer, DEFAULT_DENSIFY_POINTS};
pub use error::RasterError;
pub use geotiff::{read_geotiff, read_info, write_geotiff, write_geotiff_to, GeoKeys, GeoTiffInfo};
pub use raster::{fill_value, DataType, GeoRaster};
pub use transform::GeoTransform;
pub use warp::{default_transform, reproject, Resampling};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
