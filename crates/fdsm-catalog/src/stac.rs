//! Serde models for STAC Item Search.
//!
//! Only the fields the pipeline reads are modelled; everything else in a
//! response is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body for `POST /search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Collections to search.
    pub collections: Vec<String>,
    /// `[west, south, east, north]` in WGS84 degrees.
    pub bbox: [f64; 4],
    /// Page size requested from the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Server-issued continuation token, when paging by token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCollection {
    /// Items on this page.
    #[serde(default)]
    pub features: Vec<Item>,
    /// Navigation links; `rel = "next"` continues the search.
    #[serde(default)]
    pub links: Vec<Link>,
}

impl ItemCollection {
    /// The continuation link, if the result set has more pages.
    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// A catalog item.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    /// Item identifier.
    pub id: String,
    /// Assets by key.
    #[serde(default)]
    pub assets: HashMap<String, Asset>,
}

/// A downloadable asset of an item.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    /// Asset location.
    pub href: String,
    /// Media type.
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
}

/// A navigation link.
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    /// Relation type.
    pub rel: String,
    /// Target URL.
    pub href: String,
    /// HTTP method for the request, `GET` when absent.
    #[serde(default)]
    pub method: Option<String>,
    /// Request body for POST links.
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Whether `body` is merged into the original request body.
    #[serde(default)]
    pub merge: Option<bool>,
}
