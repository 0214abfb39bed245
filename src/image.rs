//! Image localization.
//!
//! Turns an image reference found in scraped content into a file under the
//! image root and returns the path to substitute into the content.
//!
//! Resolution is split in two:
//!
//! 1. [`plan`] is pure: it normalizes the URL, applies [`HOST_RULES`] and
//!    yields the URL to fetch plus the local path to store at.
//! 2. [`ImagePipeline::localize`] skips the download when the store path
//!    already exists, otherwise fetches with the browser identity.
//!
//! Two references that plan to the same local path are downloaded once, no
//! matter which adapter or run produced them.

use crate::error::{Error, Result};
use crate::http::{HttpClient, Identity};
use crate::utils::{md5_hex, path_exists};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// How a rule selects hosts.
#[derive(Debug, Clone, Copy)]
pub enum HostMatch {
    Contains(&'static str),
    Exact(&'static str),
}

impl HostMatch {
    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostMatch::Contains(s) => host.contains(s),
            HostMatch::Exact(s) => host == *s,
        }
    }
}

/// Extension for hash-addressed files.
#[derive(Debug, Clone, Copy)]
pub enum Extension {
    Fixed(&'static str),
    /// Taken from a query parameter. Without a fallback the rule does not
    /// apply when the parameter is missing.
    Query {
        param: &'static str,
        fallback: Option<&'static str>,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// Cut the fetch URL at this marker; the local path is untouched.
    StripQuery(&'static str),
    /// Refuse URLs whose path equals this one.
    Reject { path: &'static str },
    /// Cut the local path at the first `marker`, then append `append`.
    TruncateAt {
        marker: &'static str,
        append: &'static str,
    },
    /// Replace every char in `chars` with `with` in the local path, then append `append`.
    ReplaceChars {
        chars: &'static [char],
        with: char,
        append: &'static str,
    },
    /// Store at `/<dir>/<md5(fetch url)>.<ext>` instead of the URL path.
    HashAddress { dir: &'static str, ext: Extension },
}

#[derive(Debug, Clone, Copy)]
pub struct HostRule {
    pub name: &'static str,
    pub host: HostMatch,
    pub transform: Transform,
}

/// Host canonicalization rules in evaluation order.
///
/// Every rule whose host matches is applied, in order, each seeing the
/// previous rules' output. A reject ends evaluation.
pub const HOST_RULES: &[HostRule] = &[
    HostRule {
        name: "aliyun-oss-process",
        host: HostMatch::Contains(".aliyuncs.com"),
        transform: Transform::StripQuery("?x-oss-process"),
    },
    HostRule {
        name: "jianshu-image-mogr",
        host: HostMatch::Exact("upload-images.jianshu.io"),
        transform: Transform::StripQuery("?imageMogr2"),
    },
    HostRule {
        name: "toutiao-open-image",
        host: HostMatch::Contains(".toutiao.com"),
        transform: Transform::Reject {
            path: "/mp/agw/article_material/open_image/get",
        },
    },
    HostRule {
        name: "toutiaoimg-crop",
        host: HostMatch::Contains(".toutiaoimg.com"),
        transform: Transform::TruncateAt {
            marker: "~",
            append: ".jpg",
        },
    },
    HostRule {
        name: "byteimg-template",
        host: HostMatch::Contains(".byteimg.com"),
        transform: Transform::ReplaceChars {
            chars: &['~', ':'],
            with: '_',
            append: ".jpg",
        },
    },
    HostRule {
        name: "ws126-type",
        host: HostMatch::Contains(".ws.126.net"),
        transform: Transform::HashAddress {
            dir: "ws126net",
            ext: Extension::Query {
                param: "type",
                fallback: None,
            },
        },
    },
    HostRule {
        name: "inews-gtimg",
        host: HostMatch::Contains("inews.gtimg.com"),
        transform: Transform::HashAddress {
            dir: "inews_gtimg_com",
            ext: Extension::Fixed("jpg"),
        },
    },
    HostRule {
        name: "qpic-wx-fmt",
        host: HostMatch::Contains(".qpic.cn"),
        transform: Transform::HashAddress {
            dir: "qpic_cn",
            ext: Extension::Query {
                param: "wx_fmt",
                fallback: Some("jpg"),
            },
        },
    },
    HostRule {
        name: "meipian-mobile",
        host: HostMatch::Contains(".meipian.me"),
        transform: Transform::TruncateAt {
            marker: "-mobile",
            append: "",
        },
    },
];

fn query_value(link: &Url, param: &str) -> Option<String> {
    link.query_pairs()
        .find(|(k, _)| k == param)
        .map(|(_, v)| v.into_owned())
}

impl Transform {
    fn apply(&self, link: &Url, fetch_url: &mut String, local: &mut String) -> Result<()> {
        match *self {
            Transform::StripQuery(marker) => {
                if let Some(idx) = fetch_url.find(marker) {
                    fetch_url.truncate(idx);
                }
            }
            Transform::Reject { path } => {
                if link.path() == path {
                    return Err(Error::InvalidImage(fetch_url.clone()));
                }
            }
            Transform::TruncateAt { marker, append } => {
                if let Some(idx) = local.find(marker) {
                    local.truncate(idx);
                }
                local.push_str(append);
            }
            Transform::ReplaceChars { chars, with, append } => {
                *local = local.replace(chars, &with.to_string());
                local.push_str(append);
            }
            Transform::HashAddress { dir, ext } => {
                let ext = match ext {
                    Extension::Fixed(e) => e.to_string(),
                    Extension::Query { param, fallback } => {
                        match (query_value(link, param), fallback) {
                            (Some(v), _) => v,
                            (None, Some(f)) => f.to_string(),
                            (None, None) => return Ok(()),
                        }
                    }
                };
                *local = format!("/{dir}/{}.{ext}", md5_hex(fetch_url));
            }
        }
        Ok(())
    }
}

/// Where an image will be fetched from and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlan {
    pub fetch_url: String,
    /// Path under the image root, always starting with `/`.
    pub local_path: String,
}

/// Resolves a raw image reference without touching the network or disk.
pub fn plan(raw: &str) -> Result<ImagePlan> {
    let mut fetch_url = raw.trim().to_string();
    if fetch_url.starts_with("//") {
        fetch_url.insert_str(0, "http:");
    }

    let link = Url::parse(&fetch_url)?;
    if !link.scheme().contains("http") {
        return Err(Error::NotScheme(fetch_url));
    }
    let host = link.host_str().unwrap_or_default();

    let mut local = urlencoding::decode(link.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| link.path().to_string());

    for rule in HOST_RULES.iter().filter(|r| r.host.matches(host)) {
        rule.transform.apply(&link, &mut fetch_url, &mut local)?;
        debug!(rule = rule.name, %local, "Applied host rule");
    }

    if local.trim_matches('/').is_empty() || local.ends_with('/') {
        return Err(Error::NotFile(fetch_url));
    }
    if local.split('/').any(|seg| seg == "..") {
        return Err(Error::InvalidImage(fetch_url));
    }

    Ok(ImagePlan {
        fetch_url,
        local_path: local,
    })
}

/// A localized image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localized {
    /// Path relative to the image root, for substitution into content.
    pub local_path: String,
    /// Full filesystem path.
    pub store_path: PathBuf,
    /// False when an existing file was reused.
    pub fetched: bool,
}

#[derive(Debug, Clone)]
pub struct ImagePipeline {
    root: PathBuf,
    http: HttpClient,
}

impl ImagePipeline {
    pub fn new(root: impl Into<PathBuf>, http: HttpClient) -> Self {
        Self {
            root: root.into(),
            http,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self, local_path: &str) -> PathBuf {
        self.root.join(local_path.trim_start_matches('/'))
    }

    /// Localizes one image reference.
    ///
    /// Plans the fetch URL and local path, then downloads the image with the
    /// browser identity unless a file already sits at the local path.
    ///
    /// # Arguments
    ///
    /// * `raw` - The image reference as found in the page
    ///
    /// # Returns
    ///
    /// The [`Localized`] image, or the first error from planning or fetching.
    /// An existing file is reused without any request (`fetched == false`).
    #[instrument(level = "info", skip(self))]
    pub async fn localize(&self, raw: &str) -> Result<Localized> {
        let ImagePlan {
            fetch_url,
            local_path,
        } = plan(raw)?;
        let store_path = self.store_path(&local_path);

        if path_exists(&store_path).await {
            debug!(path = %store_path.display(), "Image already stored");
            return Ok(Localized {
                local_path,
                store_path,
                fetched: false,
            });
        }

        let bytes = self
            .http
            .get_to_file(&fetch_url, Identity::Browser, &store_path)
            .await?;
        info!(path = %store_path.display(), bytes, "Image downloaded");
        Ok(Localized {
            local_path,
            store_path,
            fetched: true,
        })
    }

    /// Localizes references one by one in the given order.
    ///
    /// # Arguments
    ///
    /// * `refs` - Raw image references in document order
    ///
    /// # Returns
    ///
    /// Local paths of the successful references keyed by raw reference.
    /// Failures are logged and left out so the caller can drop those
    /// elements.
    pub async fn localize_each<I>(&self, refs: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut done: HashMap<String, String> = HashMap::new();
        let mut failed = 0usize;
        for raw in refs {
            if done.contains_key(&raw) {
                continue;
            }
            match self.localize(&raw).await {
                Ok(img) => {
                    done.insert(raw, img.local_path);
                }
                Err(e) => {
                    failed += 1;
                    if e.is_image_failure() {
                        warn!(src = %raw, error = %e, "Image rejected; dropping element");
                    } else {
                        warn!(src = %raw, error = %e, "Image download failed; dropping element");
                    }
                }
            }
        }
        debug!(localized = done.len(), failed, "Localized content images");
        done
    }
}
