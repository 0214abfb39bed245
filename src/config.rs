//! Runtime configuration.
//!
//! Loaded from a YAML file when one is given, otherwise every field takes its
//! default:
//!
//! ```yaml
//! image_root: ./upload_temp
//! snapshot_root: ./snapshot
//! list_timeout_secs: 6
//! fetch_timeout_secs: 600
//! upload_timeout_secs: 600
//! sites:
//!   - id: 423
//!     name: example
//!     path: /www/wwwroot/example.com
//! ```

use crate::error::{Error, Result};
use crate::publish::Site;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local directory downloaded images are stored under.
    pub image_root: PathBuf,
    /// Local directory detail-page snapshots are stored under.
    pub snapshot_root: PathBuf,
    /// Timeout for listing requests.
    pub list_timeout_secs: u64,
    /// Timeout for detail pages and image downloads.
    pub fetch_timeout_secs: u64,
    /// Timeout for a single image upload.
    pub upload_timeout_secs: u64,
    /// Publishing targets.
    pub sites: Vec<Site>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_root: PathBuf::from("./upload_temp"),
            snapshot_root: PathBuf::from("./snapshot"),
            list_timeout_secs: 6,
            fetch_timeout_secs: 600,
            upload_timeout_secs: 600,
            sites: Vec::new(),
        }
    }
}

impl Config {
    /// Reads a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::fs(path, e))?;
        let config = Self::from_yaml(&raw)?;
        info!(
            image_root = %config.image_root.display(),
            snapshot_root = %config.snapshot_root.display(),
            sites = config.sites.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}
