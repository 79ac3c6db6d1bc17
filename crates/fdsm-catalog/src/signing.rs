//! Access URL signing.

use crate::{CatalogError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Planetary Computer SAS signing endpoint.
pub const PLANETARY_COMPUTER_SIGN: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

/// Turns an asset URL into a time-limited access URL.
///
/// Called once per tile, immediately before it is downloaded.
pub trait UrlSigner: Send + Sync {
    /// Sign `href`.
    fn sign(&self, href: &str) -> Result<String>;
}

/// Identity signer for catalogs with public assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSigning;

impl UrlSigner for NoSigning {
    fn sign(&self, href: &str) -> Result<String> {
        Ok(href.to_string())
    }
}

#[derive(Deserialize)]
struct SignedLink {
    href: String,
}

/// Signs blob URLs through the Planetary Computer SAS API.
pub struct PlanetaryComputerSigner {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for PlanetaryComputerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanetaryComputerSigner")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl PlanetaryComputerSigner {
    /// Signer against the public endpoint.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoint(PLANETARY_COMPUTER_SIGN, timeout)
    }

    /// Signer against a custom endpoint.
    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    /// The request URL that signs `href`.
    pub fn request_url(&self, href: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse_with_params(&self.endpoint, &[("href", href)])
            .map_err(|e| CatalogError::Signing(format!("bad signing endpoint {}: {e}", self.endpoint)))
    }
}

impl UrlSigner for PlanetaryComputerSigner {
    fn sign(&self, href: &str) -> Result<String> {
        let url = self.request_url(href)?;
        let response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Signing(format!("HTTP {status} signing {href}")));
        }

        let signed: SignedLink = response.json()?;
        Ok(signed.href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signing_is_identity() {
        assert_eq!(NoSigning.sign("https://h/a.tif").unwrap(), "https://h/a.tif");
    }

    #[test]
    fn test_request_url_encodes_href() {
        let signer = PlanetaryComputerSigner::new(Duration::from_secs(5)).unwrap();
        let url = signer
            .request_url("https://blob.example/dsm/a b.tif?x=1")
            .unwrap();
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "href");
        assert_eq!(pairs[0].1, "https://blob.example/dsm/a b.tif?x=1");
        assert!(url.as_str().starts_with(PLANETARY_COMPUTER_SIGN));
    }
}
