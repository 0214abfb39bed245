//! JSON output of collected batches.
//!
//! Files are grouped by adapter and named after the tag and page they were
//! listed from, so re-collecting a page overwrites its previous file.

use crate::error::{Error, Result};
use crate::models::Batch;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// `{json_output_dir}/{adapter}/{tag}_{page}.json`
pub fn batch_path(json_output_dir: &Path, batch: &Batch) -> PathBuf {
    json_output_dir
        .join(&batch.adapter)
        .join(format!("{}_{}.json", batch.tag, batch.page))
}

/// Write a [`Batch`] as pretty-printed JSON.
///
/// Creates the adapter directory when missing and overwrites any earlier
/// file for the same tag and page.
///
/// # Arguments
///
/// * `batch` - The collected articles to serialize
/// * `json_output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path written, or an error if serialization, directory creation or
/// file writing fails.
///
/// # Output Path
///
/// See [`batch_path`].
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir.display(), adapter = %batch.adapter))]
pub async fn write_batch(batch: &Batch, json_output_dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(batch)?;
    let path = batch_path(json_output_dir, batch);

    if let Some(dir) = path.parent() {
        info!(dir = %dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(Error::fs(dir, e));
        }
    }

    fs::write(&path, json)
        .await
        .map_err(|e| Error::fs(&path, e))?;
    info!(path = %path.display(), articles = batch.articles.len(), "Wrote JSON batch");
    Ok(path)
}
