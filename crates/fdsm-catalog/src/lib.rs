//! # fdsm-catalog
//!
//! Discovery and download of elevation tiles from a STAC catalog.
//!
//! - [`CatalogQuery`] / [`StacClient`]: item search by WGS84 box, with the
//!   full result set materialized across pages
//! - [`UrlSigner`]: time-limited access URLs ([`PlanetaryComputerSigner`],
//!   [`NoSigning`])
//! - [`TileFetcher`]: sequential or bounded-parallel download into a local
//!   directory, order-stable and fail-fast
//!
//! ## Example
//!
//! ```no_run
//! use fdsm_catalog::{
//!     CatalogQuery, HttpDownloader, PlanetaryComputerSigner, StacClient, TileFetcher,
//!     DEFAULT_COLLECTION,
//! };
//! use fdsm_raster::{BoundingBox, Crs};
//! use std::time::Duration;
//!
//! let client = StacClient::planetary_computer()?;
//! let bbox = BoundingBox::new(-76.5, 40.2, -76.4, 40.3, Crs::WGS84)?;
//! let items = client.search(DEFAULT_COLLECTION, &bbox)?;
//!
//! let timeout = Duration::from_secs(60);
//! let fetcher = TileFetcher::new(
//!     Box::new(PlanetaryComputerSigner::new(timeout)?),
//!     Box::new(HttpDownloader::new(timeout)?),
//! );
//! let tiles = fetcher.fetch_all(&items, std::path::Path::new("/tmp/tiles"))?;
//! println!("{} tiles", tiles.paths.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;
mod error;
mod fetch;
mod signing;
pub mod stac;

pub use client::{
    items_from_page, next_request, search_url, CatalogItem, CatalogQuery, NextRequest, StacClient,
    DEFAULT_ASSET_KEY, DEFAULT_COLLECTION, PLANETARY_COMPUTER_STAC,
};
pub use error::CatalogError;
pub use fetch::{
    file_name_from_url, local_file_names, DownloadStats, FetchedTiles, HttpDownloader,
    TileDownloader, TileFetcher,
};
pub use signing::{NoSigning, PlanetaryComputerSigner, UrlSigner, PLANETARY_COMPUTER_SIGN};

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
