//! Fetch-through cache for raw detail pages.
//!
//! Pages are fetched once and kept forever so extraction rules can be
//! re-run without touching the network.
//!
//! # Layout
//!
//! ```text
//! snapshot_root/
//! └── <adapter>/
//!     └── <md5[0]>/
//!         └── <md5(canonical_url)>.html   # raw response body
//! ```
//!
//! Existence of the file is the only guard. Two concurrent misses for the
//! same URL may both fetch; the last write wins.

use crate::error::{Error, Result};
use crate::http::{HttpClient, Identity};
use crate::utils::{md5_hex, path_exists};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    root: PathBuf,
    http: HttpClient,
}

impl SnapshotCache {
    pub fn new(root: impl Into<PathBuf>, http: HttpClient) -> Self {
        Self {
            root: root.into(),
            http,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic snapshot path for `url` under `adapter`.
    pub fn path_for(&self, adapter: &str, url: &str) -> PathBuf {
        let hash = md5_hex(url);
        self.root
            .join(adapter)
            .join(&hash[..1])
            .join(format!("{hash}.html"))
    }

    /// True when a snapshot exists; never touches the network.
    pub async fn contains(&self, adapter: &str, url: &str) -> bool {
        path_exists(&self.path_for(adapter, url)).await
    }

    /// Returns the raw page body, fetching and storing it on a miss.
    ///
    /// The returned bytes are always read back from the snapshot file, even
    /// right after fetching.
    ///
    /// # Arguments
    ///
    /// * `adapter` - Name of the adapter that owns the page
    /// * `url` - Detail URL; its MD5 names the snapshot file
    ///
    /// # Returns
    ///
    /// The stored bytes, or `FetchFailed` / `FilesystemFailed` when the page
    /// could not be fetched or written. Nothing is stored on a failed fetch.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_or_load(&self, adapter: &str, url: &str) -> Result<Vec<u8>> {
        let path = self.path_for(adapter, url);
        if let Some(shard) = path.parent() {
            tokio::fs::create_dir_all(shard)
                .await
                .map_err(|e| Error::fs(shard, e))?;
        }

        if path_exists(&path).await {
            debug!(path = %path.display(), "Snapshot hit");
        } else {
            let bytes = self.http.get_to_file(url, Identity::Spider, &path).await?;
            info!(path = %path.display(), bytes, "Snapshot stored");
        }

        tokio::fs::read(&path).await.map_err(|e| Error::fs(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache(root: &Path) -> SnapshotCache {
        let http = HttpClient::new(Duration::from_secs(5), Duration::from_secs(30)).unwrap();
        SnapshotCache::new(root, http)
    }

    #[test]
    fn test_path_layout() {
        let c = cache(Path::new("/snap"));
        let p = c.path_for("techsir_com", "https://www.techsir.com/ebiz/1.html");
        assert_eq!(
            p,
            PathBuf::from("/snap/techsir_com/8/81f1d1eeeea324bf09b943c17a2579c6.html")
        );
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a/1.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>detail</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let c = cache(tmp.path());
        let url = format!("{}/a/1.html", server.uri());

        assert!(!c.contains("site", &url).await);
        let first = c.fetch_or_load("site", &url).await.unwrap();
        assert!(c.contains("site", &url).await);
        let second = c.fetch_or_load("site", &url).await.unwrap();

        assert_eq!(first, b"<html>detail</html>".to_vec());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_snapshot_needs_no_network() {
        let tmp = TempDir::new().unwrap();
        let c = cache(tmp.path());
        // nothing listens here
        let url = "http://127.0.0.1:9/never.html";
        let p = c.path_for("site", url);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, b"cached").unwrap();

        assert_eq!(c.fetch_or_load("site", url).await.unwrap(), b"cached".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let c = cache(tmp.path());
        let url = format!("{}/broken.html", server.uri());
        let err = c.fetch_or_load("site", &url).await.unwrap_err();
        assert!(matches!(err, Error::FetchFailed(_)));
        assert!(!c.contains("site", &url).await);
    }

    #[tokio::test]
    async fn test_adapters_do_not_share_snapshots() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(2)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let c = cache(tmp.path());
        let url = format!("{}/p.html", server.uri());
        c.fetch_or_load("one", &url).await.unwrap();
        c.fetch_or_load("two", &url).await.unwrap();
    }
}
