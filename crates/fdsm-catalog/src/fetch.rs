//! Tile download into a local directory.

use crate::{CatalogError, CatalogItem, Result, UrlSigner};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Writes the payload at a URL to a local file.
pub trait TileDownloader: Send + Sync {
    /// Download `url` to `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Streams tiles over HTTP(S).
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for HttpDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloader").finish()
    }
}

impl HttpDownloader {
    /// Downloader with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl TileDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let failed = |reason: String| CatalogError::Download {
            url: redact(url),
            reason,
        };

        let mut response = self.client.get(url).send().map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let mut writer = BufWriter::new(File::create(dest)?);
        let bytes = response
            .copy_to(&mut writer)
            .map_err(|e| failed(e.to_string()))?;
        writer.flush()?;
        Ok(bytes)
    }
}

/// Signed URLs carry credentials in the query string.
fn redact(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}

/// Download statistics for one fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    /// Number of tiles downloaded.
    pub tiles_downloaded: usize,
    /// Total bytes downloaded.
    pub bytes_downloaded: u64,
}

/// Result of fetching a batch of catalog items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTiles {
    /// Local paths, one per item, in item order.
    pub paths: Vec<PathBuf>,
    /// Download statistics.
    pub stats: DownloadStats,
}

/// Signs and downloads catalog items into a directory.
///
/// With one worker, items are fetched strictly in order. With more, they are
/// fetched on a bounded pool; the returned paths still follow item order and
/// the first failure aborts the batch.
pub struct TileFetcher {
    signer: Box<dyn UrlSigner>,
    downloader: Box<dyn TileDownloader>,
    workers: usize,
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("workers", &self.workers)
            .finish()
    }
}

impl TileFetcher {
    /// Create a sequential fetcher.
    pub fn new(signer: Box<dyn UrlSigner>, downloader: Box<dyn TileDownloader>) -> Self {
        Self {
            signer,
            downloader,
            workers: 1,
        }
    }

    /// Set the number of concurrent downloads (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Number of concurrent downloads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every item into `dest_dir`.
    pub fn fetch_all(&self, items: &[CatalogItem], dest_dir: &Path) -> Result<FetchedTiles> {
        let names = local_file_names(items)?;
        let jobs: Vec<(&CatalogItem, PathBuf)> = items
            .iter()
            .zip(names)
            .map(|(item, name)| (item, dest_dir.join(name)))
            .collect();

        let results: Vec<(PathBuf, u64)> = if self.workers <= 1 {
            jobs.into_iter()
                .map(|(item, path)| self.fetch_one(item, path))
                .collect::<Result<_>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()?;
            pool.install(|| {
                jobs.into_par_iter()
                    .map(|(item, path)| self.fetch_one(item, path))
                    .collect::<Result<_>>()
            })?
        };

        let stats = DownloadStats {
            tiles_downloaded: results.len(),
            bytes_downloaded: results.iter().map(|(_, bytes)| bytes).sum(),
        };
        info!(
            tiles = stats.tiles_downloaded,
            bytes = stats.bytes_downloaded,
            workers = self.workers,
            "Tiles downloaded"
        );

        Ok(FetchedTiles {
            paths: results.into_iter().map(|(path, _)| path).collect(),
            stats,
        })
    }

    fn fetch_one(&self, item: &CatalogItem, path: PathBuf) -> Result<(PathBuf, u64)> {
        let url = self.signer.sign(&item.href)?;
        let bytes = self.downloader.download(&url, &path)?;
        debug!(item = %item.id, path = %path.display(), bytes, "Downloaded tile");
        Ok((path, bytes))
    }
}

/// Final path segment of a URL.
pub fn file_name_from_url(href: &str) -> Result<String> {
    let url = reqwest::Url::parse(href).map_err(|e| CatalogError::InvalidUrl(format!("{href}: {e}")))?;
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CatalogError::InvalidUrl(href.to_string()))
}

/// Distinct local file names for a batch: the URL's final path segment,
/// prefixed with the item index when an earlier item already took the name,
/// and with a counter after the index if that is taken too.
pub fn local_file_names(items: &[CatalogItem]) -> Result<Vec<String>> {
    let mut used = HashSet::new();
    let mut names = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let base = file_name_from_url(&item.href)?;
        let mut name = base.clone();
        let mut attempt = 0usize;
        while used.contains(&name) {
            name = match attempt {
                0 => format!("{index}_{base}"),
                n => format!("{index}_{n}_{base}"),
            };
            attempt += 1;
        }
        used.insert(name.clone());
        names.push(name);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoSigning;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Writes the URL itself as the payload, optionally failing on one URL.
    struct EchoDownloader {
        fail_on: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl TileDownloader for EchoDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(url) {
                return Err(CatalogError::Download {
                    url: url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                });
            }
            // Later items finish first to shake out ordering bugs
            let delay = 20u64.saturating_sub(url.len() as u64 % 20);
            std::thread::sleep(Duration::from_millis(delay));
            std::fs::write(dest, url)?;
            Ok(url.len() as u64)
        }
    }

    fn items(n: usize) -> Vec<CatalogItem> {
        (0..n)
            .map(|i| CatalogItem::new(format!("item-{i}"), format!("https://h/{}/tile{i}.tif", "x".repeat(i))))
            .collect()
    }

    fn fetcher(fail_on: Option<&str>) -> (TileFetcher, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let downloader = EchoDownloader {
            fail_on: fail_on.map(str::to_string),
            calls: calls.clone(),
        };
        (TileFetcher::new(Box::new(NoSigning), Box::new(downloader)), calls)
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://blob/3dep/USGS_1M_18_x50y443.tif?sv=2021").unwrap(),
            "USGS_1M_18_x50y443.tif"
        );
        assert!(file_name_from_url("https://blob/dir/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    #[test]
    fn test_colliding_names_get_index_prefix() {
        let items = vec![
            CatalogItem::new("a", "https://h/one/tile.tif"),
            CatalogItem::new("b", "https://h/two/tile.tif"),
            CatalogItem::new("c", "https://h/other.tif"),
        ];
        assert_eq!(
            local_file_names(&items).unwrap(),
            vec!["tile.tif", "1_tile.tif", "other.tif"]
        );
    }

    #[test]
    fn test_prefixed_name_already_taken() {
        let items = vec![
            CatalogItem::new("a", "https://h/one/2_t.tif"),
            CatalogItem::new("b", "https://h/two/t.tif"),
            CatalogItem::new("c", "https://h/three/t.tif"),
            CatalogItem::new("d", "https://h/four/2_1_t.tif"),
            CatalogItem::new("e", "https://h/five/t.tif"),
        ];
        let names = local_file_names(&items).unwrap();
        assert_eq!(names, vec!["2_t.tif", "t.tif", "2_1_t.tif", "3_2_1_t.tif", "4_t.tif"]);

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), items.len());
    }

    #[test]
    fn test_fetch_keeps_every_colliding_tile() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(None);
        let items = vec![
            CatalogItem::new("a", "https://h/one/2_t.tif"),
            CatalogItem::new("b", "https://h/two/t.tif"),
            CatalogItem::new("c", "https://h/three/t.tif"),
        ];

        let fetched = fetcher.with_workers(3).fetch_all(&items, dir.path()).unwrap();
        for (item, path) in items.iter().zip(&fetched.paths) {
            assert_eq!(std::fs::read_to_string(path).unwrap(), item.href);
        }
    }

    #[test]
    fn test_sequential_fetch_in_order() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(None);
        let items = items(4);

        let fetched = fetcher.fetch_all(&items, dir.path()).unwrap();
        assert_eq!(fetched.paths.len(), 4);
        for (i, path) in fetched.paths.iter().enumerate() {
            assert_eq!(path, &dir.path().join(format!("tile{i}.tif")));
            assert_eq!(std::fs::read_to_string(path).unwrap(), items[i].href);
        }
        assert_eq!(fetched.stats.tiles_downloaded, 4);
        let expected: u64 = items.iter().map(|i| i.href.len() as u64).sum();
        assert_eq!(fetched.stats.bytes_downloaded, expected);
    }

    #[test]
    fn test_parallel_fetch_keeps_item_order() {
        let dir = TempDir::new().unwrap();
        let (fetcher, _) = fetcher(None);
        let fetcher = fetcher.with_workers(4);
        let items = items(12);

        let fetched = fetcher.fetch_all(&items, dir.path()).unwrap();
        let expected: Vec<PathBuf> = (0..12)
            .map(|i| dir.path().join(format!("tile{i}.tif")))
            .collect();
        assert_eq!(fetched.paths, expected);
    }

    #[test]
    fn test_sequential_failure_stops_batch() {
        let dir = TempDir::new().unwrap();
        let items = items(5);
        let (fetcher, calls) = fetcher(Some(&items[1].href));

        let err = fetcher.fetch_all(&items, dir.path()).unwrap_err();
        assert!(matches!(err, CatalogError::Download { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parallel_failure_fails_batch() {
        let dir = TempDir::new().unwrap();
        let items = items(8);
        let (fetcher, _) = fetcher(Some(&items[5].href));
        let fetcher = fetcher.with_workers(3);

        assert!(matches!(
            fetcher.fetch_all(&items, dir.path()),
            Err(CatalogError::Download { .. })
        ));
    }

    #[test]
    fn test_empty_batch() {
        let dir = TempDir::new().unwrap();
        let (fetcher, calls) = fetcher(None);
        let fetched = fetcher.fetch_all(&[], dir.path()).unwrap();
        assert!(fetched.paths.is_empty());
        assert_eq!(fetched.stats, DownloadStats::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_redact_strips_query() {
        assert_eq!(redact("https://h/a.tif?sig=secret"), "https://h/a.tif");
    }
}
