//! STAC item search.

use crate::stac::{ItemCollection, Link, SearchParams};
use crate::{CatalogError, Result};
use fdsm_raster::{BoundingBox, Crs};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Planetary Computer STAC API root.
pub const PLANETARY_COMPUTER_STAC: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";

/// 3DEP lidar-derived DSM collection.
pub const DEFAULT_COLLECTION: &str = "3dep-lidar-dsm";

/// Asset key holding the DSM GeoTIFF.
pub const DEFAULT_ASSET_KEY: &str = "data";

const DEFAULT_PAGE_LIMIT: u32 = 100;

/// A catalog hit: an item identifier and the URL of its elevation asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Item identifier.
    pub id: String,
    /// Unsigned asset URL.
    pub href: String,
}

impl CatalogItem {
    /// Create an item.
    pub fn new(id: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
        }
    }
}

/// Finds elevation tiles intersecting a WGS84 box.
///
/// Implementations return the complete result set in catalog order. An
/// empty result is not an error.
pub trait CatalogQuery: Send + Sync {
    /// Search `collection` for items intersecting `bbox`.
    fn search(&self, collection: &str, bbox: &BoundingBox) -> Result<Vec<CatalogItem>>;
}

/// Blocking STAC API client.
///
/// Follows `next` links until the result set is exhausted. Failures are not
/// retried; they surface to the caller.
pub struct StacClient {
    search_url: String,
    asset_key: String,
    page_limit: u32,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for StacClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StacClient")
            .field("search_url", &self.search_url)
            .field("asset_key", &self.asset_key)
            .finish()
    }
}

impl StacClient {
    /// Create a client for the STAC API rooted at `base_url`.
    pub fn new(base_url: &str, asset_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            search_url: search_url(base_url),
            asset_key: asset_key.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            client,
        })
    }

    /// Client for the Planetary Computer with default settings.
    pub fn planetary_computer() -> Result<Self> {
        Self::new(PLANETARY_COMPUTER_STAC, DEFAULT_ASSET_KEY, Duration::from_secs(60))
    }

    /// Set the page size requested per search call.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// The `/search` endpoint.
    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    fn post(&self, url: &str, body: &serde_json::Value) -> Result<ItemCollection> {
        let response = self.client.post(url).json(body).send()?;
        parse_page(url, response)
    }

    fn get(&self, url: &str) -> Result<ItemCollection> {
        let response = self.client.get(url).send()?;
        parse_page(url, response)
    }
}

impl CatalogQuery for StacClient {
    fn search(&self, collection: &str, bbox: &BoundingBox) -> Result<Vec<CatalogItem>> {
        if bbox.crs() != Crs::WGS84 {
            return Err(CatalogError::SearchCrs(bbox.crs().epsg()));
        }

        let params = SearchParams {
            collections: vec![collection.to_string()],
            bbox: bbox.to_array(),
            limit: Some(self.page_limit),
            token: None,
        };
        let params = serde_json::to_value(&params)?;

        let mut items = Vec::new();
        let mut page = self.post(&self.search_url, &params)?;
        let mut pages = 1;

        loop {
            let next = page.next_link().cloned();
            let returned = page.features.len();
            items.extend(items_from_page(page, &self.asset_key)?);

            let Some(link) = next else { break };
            if returned == 0 {
                break;
            }

            page = match next_request(&link, &params) {
                NextRequest::Get(url) => self.get(&url)?,
                NextRequest::Post(url, body) => self.post(&url, &body)?,
            };
            pages += 1;
        }

        debug!(collection, pages, items = items.len(), "STAC search complete");
        Ok(items)
    }
}

/// Append `/search` to a STAC API root unless it is already there.
pub fn search_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/search") {
        base.to_string()
    } else {
        format!("{base}/search")
    }
}

fn parse_page(url: &str, response: reqwest::blocking::Response) -> Result<ItemCollection> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(CatalogError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    let text = response.text()?;
    Ok(serde_json::from_str(&text)?)
}

/// Map a page of items to catalog hits, requiring `asset_key` on every item.
pub fn items_from_page(page: ItemCollection, asset_key: &str) -> Result<Vec<CatalogItem>> {
    page.features
        .into_iter()
        .map(|mut item| match item.assets.remove(asset_key) {
            Some(asset) => Ok(CatalogItem::new(item.id, asset.href)),
            None => Err(CatalogError::MissingAsset {
                item: item.id,
                asset: asset_key.to_string(),
            }),
        })
        .collect()
}

/// How to fetch the page a `next` link points at.
#[derive(Debug, Clone, PartialEq)]
pub enum NextRequest {
    /// Plain GET of the link target.
    Get(String),
    /// POST of the given body to the link target.
    Post(String, serde_json::Value),
}

/// Resolve a `next` link against the original search body.
///
/// POST links either replace the body or, with `merge: true`, overlay their
/// body onto the original one.
pub fn next_request(link: &Link, original: &serde_json::Value) -> NextRequest {
    let method = link.method.as_deref().unwrap_or("GET");
    if !method.eq_ignore_ascii_case("POST") {
        return NextRequest::Get(link.href.clone());
    }

    let body = match (&link.body, link.merge.unwrap_or(false)) {
        (Some(body), true) => {
            let mut merged = original.clone();
            if let (Some(base), Some(overlay)) = (merged.as_object_mut(), body.as_object()) {
                for (k, v) in overlay {
                    base.insert(k.clone(), v.clone());
                }
            }
            merged
        }
        (Some(body), false) => body.clone(),
        (None, _) => original.clone(),
    };

    NextRequest::Post(link.href.clone(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(value: serde_json::Value) -> ItemCollection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url(PLANETARY_COMPUTER_STAC),
            "https://planetarycomputer.microsoft.com/api/stac/v1/search"
        );
        assert_eq!(search_url("https://x.org/stac/"), "https://x.org/stac/search");
        assert_eq!(search_url("https://x.org/stac/search"), "https://x.org/stac/search");
    }

    #[test]
    fn test_items_from_page_preserves_order() {
        let p = page(json!({
            "type": "FeatureCollection",
            "features": [
                {"id": "b", "assets": {"data": {"href": "https://h/b.tif"}}},
                {"id": "a", "assets": {"data": {"href": "https://h/a.tif"}, "thumbnail": {"href": "x"}}}
            ],
            "links": []
        }));
        let items = items_from_page(p, "data").unwrap();
        assert_eq!(
            items,
            vec![
                CatalogItem::new("b", "https://h/b.tif"),
                CatalogItem::new("a", "https://h/a.tif"),
            ]
        );
    }

    #[test]
    fn test_missing_asset_is_error() {
        let p = page(json!({
            "features": [{"id": "tile-1", "assets": {"rendered": {"href": "x"}}}]
        }));
        let err = items_from_page(p, "data").unwrap_err();
        assert!(matches!(err, CatalogError::MissingAsset { ref item, .. } if item == "tile-1"));
    }

    #[test]
    fn test_empty_page() {
        let p = page(json!({"type": "FeatureCollection", "features": []}));
        assert!(p.next_link().is_none());
        assert!(items_from_page(p, "data").unwrap().is_empty());
    }

    #[test]
    fn test_next_request_get() {
        let link: Link = serde_json::from_value(json!({
            "rel": "next", "href": "https://h/search?token=abc"
        }))
        .unwrap();
        assert_eq!(
            next_request(&link, &json!({})),
            NextRequest::Get("https://h/search?token=abc".into())
        );
    }

    #[test]
    fn test_next_request_post_merge() {
        let original = json!({"collections": ["3dep-lidar-dsm"], "bbox": [0, 0, 1, 1]});
        let link: Link = serde_json::from_value(json!({
            "rel": "next", "href": "https://h/search", "method": "POST",
            "body": {"token": "next:xyz"}, "merge": true
        }))
        .unwrap();

        let NextRequest::Post(url, body) = next_request(&link, &original) else {
            panic!("expected POST");
        };
        assert_eq!(url, "https://h/search");
        assert_eq!(body["token"], "next:xyz");
        assert_eq!(body["collections"][0], "3dep-lidar-dsm");
    }

    #[test]
    fn test_next_request_post_replace() {
        let link: Link = serde_json::from_value(json!({
            "rel": "next", "href": "https://h/search", "method": "post",
            "body": {"token": "t"}
        }))
        .unwrap();
        let NextRequest::Post(_, body) = next_request(&link, &json!({"bbox": [0, 0, 1, 1]})) else {
            panic!("expected POST");
        };
        assert_eq!(body, json!({"token": "t"}));
    }

    #[test]
    fn test_search_rejects_projected_box() {
        let client = StacClient::planetary_computer().unwrap();
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0, Crs::from_epsg(32618)).unwrap();
        assert!(matches!(
            client.search(DEFAULT_COLLECTION, &bbox),
            Err(CatalogError::SearchCrs(32618))
        ));
    }
}
