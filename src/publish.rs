//! Hands localized images to a publishing site.
//!
//! A [`Site`] names a remote document root. Every entry of an article's
//! `local_images` is uploaded into the directory that mirrors its local
//! path under that root:
//!
//! | Local image | Site path | Remote directory |
//! |-------------|-----------|------------------|
//! | `/img/a.jpg` | `/www/wwwroot/example.com` | `/www/wwwroot/example.com/img` |
//! | `/qpic_cn/<md5>.jpg` | `/srv/site/` | `/srv/site/qpic_cn` |
//!
//! Upload failures never fail the caller. They are logged at `error` with
//! the local path so the file can be pushed by hand.

use crate::error::{Error, Result};
use crate::models::Article;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// One publishing target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: u32,
    pub name: String,
    /// Document root on the remote host.
    pub path: String,
}

pub fn find_site(sites: &[Site], id: u32) -> Result<&Site> {
    sites
        .iter()
        .find(|s| s.id == id)
        .ok_or(Error::UndefinedSite(id))
}

/// Transport that puts one file into a remote directory.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, local: &Path, remote_dir: &str) -> Result<()>;
}

/// Mirrors uploads into a local directory tree, with remote directories
/// taken relative to `root`.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn target_dir(&self, remote_dir: &str) -> PathBuf {
        self.root.join(remote_dir.trim_start_matches('/'))
    }
}

#[async_trait]
impl Uploader for DirectoryUploader {
    #[instrument(level = "debug", skip(self, local), fields(local = %local.display()))]
    async fn upload(&self, local: &Path, remote_dir: &str) -> Result<()> {
        let file_name = local
            .file_name()
            .ok_or_else(|| Error::NotFile(local.display().to_string()))?;
        let dir = self.target_dir(remote_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::fs(&dir, e))?;
        let dest = dir.join(file_name);
        tokio::fs::copy(local, &dest)
            .await
            .map_err(|e| Error::fs(&dest, e))?;
        debug!(dest = %dest.display(), "Mirrored image");
        Ok(())
    }
}

/// Remote directory for a local image: the parent of `site.path + local_path`.
pub fn remote_dir(site: &Site, local_path: &str) -> String {
    let remote = format!(
        "{}/{}",
        site.path.trim_end_matches('/'),
        local_path.trim_start_matches('/')
    );
    match remote.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

/// Uploads every local image of `article` to `site`.
///
/// Each upload is bounded by `timeout`. Failures and timeouts are logged
/// at `error` and never returned.
///
/// # Arguments
///
/// * `uploader` - Transport used for every file
/// * `site` - Publishing target whose `path` prefixes the remote directories
/// * `image_root` - Local root the article's `local_images` are relative to
/// * `article` - The collected article
/// * `timeout` - Limit for a single upload
///
/// # Returns
///
/// How many uploads succeeded.
#[instrument(level = "info", skip_all, fields(site = site.id, href = %article.href))]
pub async fn upload_images(
    uploader: &dyn Uploader,
    site: &Site,
    image_root: &Path,
    article: &Article,
    timeout: Duration,
) -> usize {
    let mut uploaded = 0;
    for local_path in &article.local_images {
        let local = image_root.join(local_path.trim_start_matches('/'));
        let dir = remote_dir(site, local_path);
        match tokio::time::timeout(timeout, uploader.upload(&local, &dir)).await {
            Ok(Ok(())) => uploaded += 1,
            Ok(Err(e)) => {
                error!(local = %local.display(), remote_dir = %dir, error = %e, "Image upload failed, finish it by hand");
            }
            Err(_) => {
                error!(local = %local.display(), remote_dir = %dir, ?timeout, "Image upload timed out, finish it by hand");
            }
        }
    }
    info!(uploaded, total = article.local_images.len(), "Uploaded images");
    uploaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site(path: &str) -> Site {
        Site {
            id: 7,
            name: "example".to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_find_site() {
        let sites = vec![site("/a")];
        assert_eq!(find_site(&sites, 7).unwrap().path, "/a");
        assert!(matches!(find_site(&sites, 8), Err(Error::UndefinedSite(8))));
    }

    #[test]
    fn test_remote_dir() {
        let s = site("/www/wwwroot/example.com");
        assert_eq!(remote_dir(&s, "/img/a.jpg"), "/www/wwwroot/example.com/img");
        assert_eq!(remote_dir(&site("/srv/site/"), "/qpic_cn/x.jpg"), "/srv/site/qpic_cn");
        assert_eq!(remote_dir(&site(""), "/a.jpg"), "/");
    }

    struct Stalls;

    #[async_trait]
    impl Uploader for Stalls {
        async fn upload(&self, _local: &Path, _remote_dir: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_upload_images_mirrors_and_logs_failures() {
        let tmp = TempDir::new().unwrap();
        let image_root = tmp.path().join("upload_temp");
        tokio::fs::create_dir_all(image_root.join("img")).await.unwrap();
        tokio::fs::write(image_root.join("img/a.jpg"), b"jpg").await.unwrap();

        let mut article = Article::stub("t", "/1.html");
        article.local_images = vec!["/img/a.jpg".to_string(), "/img/missing.jpg".to_string()];

        let uploader = DirectoryUploader::new(tmp.path().join("mirror"));
        let count = upload_images(
            &uploader,
            &site("/www/example.com"),
            &image_root,
            &article,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(count, 1);
        let mirrored = tmp.path().join("mirror/www/example.com/img/a.jpg");
        assert_eq!(tokio::fs::read(mirrored).await.unwrap(), b"jpg");
    }

    #[tokio::test]
    async fn test_upload_timeout_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut article = Article::stub("t", "/1.html");
        article.local_images = vec!["/img/a.jpg".to_string()];
        let count = upload_images(
            &Stalls,
            &site("/srv"),
            tmp.path(),
            &article,
            Duration::from_millis(20),
        )
        .await;
        assert_eq!(count, 0);
    }
}
