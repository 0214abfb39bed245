//! Outbound HTTP with the two identity postures sites see.
//!
//! - [`Identity::Spider`] poses as Baidu's crawler, including a plausible
//!   `X-Forwarded-For`, so listing and detail pages are served rather than
//!   blocked. Redirects are not followed.
//! - [`Identity::Browser`] poses as desktop Chrome and follows redirects;
//!   image CDNs get this one.

use crate::config::Config;
use crate::error::{Error, Result};
use rand::{Rng, rng};
use reqwest::header::USER_AGENT;
use reqwest::{Client, redirect};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

pub const USER_AGENT_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.75 Safari/537.36";
pub const USER_AGENT_BAIDU_SPIDER: &str =
    "Mozilla/5.0 (compatible; Baiduspider-render/2.0; +http://www.baidu.com/search/spider.html)";

/// /24 prefixes Baidu's crawler is known to come from.
const BAIDU_SPIDER_PREFIXES: [&str; 5] = [
    "116.179.37.",
    "124.166.232.",
    "116.179.32.",
    "180.76.15.",
    "180.76.5.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Spider,
    Browser,
}

/// A forwarded-for address inside one of the crawler prefixes.
pub fn spider_forwarded_for() -> String {
    let mut r = rng();
    let prefix = BAIDU_SPIDER_PREFIXES[r.random_range(0..BAIDU_SPIDER_PREFIXES.len())];
    let octet: u8 = r.random_range(1..=254);
    format!("{prefix}{octet}")
}

/// Shared HTTP clients. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct HttpClient {
    crawler: Client,
    download: Client,
    list_timeout: Duration,
    fetch_timeout: Duration,
}

impl HttpClient {
    pub fn new(list_timeout: Duration, fetch_timeout: Duration) -> Result<Self> {
        let crawler = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        let download = Client::builder().build()?;
        Ok(Self {
            crawler,
            download,
            list_timeout,
            fetch_timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.list_timeout(), config.fetch_timeout())
    }

    fn request(&self, url: &str, identity: Identity, timeout: Duration) -> reqwest::RequestBuilder {
        match identity {
            Identity::Spider => self
                .crawler
                .get(url)
                .timeout(timeout)
                .header(USER_AGENT, USER_AGENT_BAIDU_SPIDER)
                .header("X-Forwarded-For", spider_forwarded_for()),
            Identity::Browser => self
                .download
                .get(url)
                .timeout(timeout)
                .header(USER_AGENT, USER_AGENT_CHROME),
        }
    }

    /// Fetches a listing page as text with the spider identity and the short timeout.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_listing(&self, url: &str) -> Result<String> {
        let resp = self
            .request(url, Identity::Spider, self.list_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;
        debug!(bytes = body.len(), "Fetched listing");
        Ok(body)
    }

    /// Streams a response body into a new file at `path`, creating parent
    /// directories as needed. Uses the long fetch timeout.
    ///
    /// A failure after the file was created leaves the partial file behind.
    #[instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    pub async fn get_to_file(&self, url: &str, identity: Identity, path: &Path) -> Result<u64> {
        let mut resp = self
            .request(url, identity, self.fetch_timeout)
            .send()
            .await?
            .error_for_status()?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::fs(parent, e))?;
        }
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::fs(path, e))?;

        let mut written = 0u64;
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await.map_err(|e| Error::fs(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| Error::fs(path, e))?;
        debug!(bytes = written, "Wrote response body");
        Ok(written)
    }
}
