//! Small helpers shared by the cache, the image pipeline and adapters.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::info;

/// Lower-case hex MD5 of `s`. Snapshot and image file names depend on this
/// exact encoding.
pub fn md5_hex(s: &str) -> String {
    format!("{:x}", md5::compute(s.as_bytes()))
}

/// Truncate a string for logging purposes.
///
/// Cuts on a char boundary at or below `max` bytes and appends the number of
/// bytes dropped.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Existence check used as the cache and dedup guard.
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Creates `path` and proves it writable with a probe file.
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Error::fs(path, e))?;
    let probe = path.join("..__probe_write__");
    tokio::fs::write(&probe, b"")
        .await
        .map_err(|e| Error::fs(&probe, e))?;
    let _ = tokio::fs::remove_file(&probe).await;
    info!(path = %path.display(), "Output directory is writable");
    Ok(())
}

/// Returns the segment after `marker` with trailing slashes removed, or an
/// empty string when `href` does not contain `marker`. Percent-escapes are
/// decoded.
///
/// `slug_after("https://x.com/tag/ai/", "/tag/")` is `"ai"`.
pub fn slug_after(href: &str, marker: &str) -> String {
    let Some((_, rest)) = href.split_once(marker) else {
        return String::new();
    };
    let rest = rest.trim_end_matches('/').trim();
    urlencoding::decode(rest)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| rest.to_string())
}
