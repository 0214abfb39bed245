//! The contract every site adapter implements, plus the shared engine it
//! works against.
//!
//! A caller gets an adapter from the [`Registry`](crate::registry::Registry),
//! lists stubs with [`Standard::article_list`], then completes each stub with
//! [`Standard::article_detail`]. Detail pages go through the
//! [`SnapshotCache`]; content images go through the [`ImagePipeline`].
//!
//! Adapters hold only immutable configuration, so one instance can serve
//! concurrent calls.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::image::ImagePipeline;
use crate::models::{Article, ArticleTag, Tag};
use crate::render::{Attrs, Rendered};
use crate::snapshot::SnapshotCache;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

/// Class given to tag links kept in content.
pub const TAG_CLASS: &str = "tag";
pub const TAG_ATTR_NAME: &str = "data-name";
pub const TAG_ATTR_VALUE: &str = "data-tag";

/// Shared I/O services handed to every adapter.
#[derive(Debug, Clone)]
pub struct Engine {
    pub config: Config,
    pub http: HttpClient,
    pub snapshots: SnapshotCache,
    pub images: ImagePipeline,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let http = HttpClient::from_config(&config)?;
        let snapshots = SnapshotCache::new(config.snapshot_root.clone(), http.clone());
        let images = ImagePipeline::new(config.image_root.clone(), http.clone());
        Ok(Self {
            config,
            http,
            snapshots,
            images,
        })
    }
}

/// Capability set of a site adapter.
#[async_trait]
pub trait Standard: Send + Sync {
    /// Registry name; also the snapshot subdirectory.
    fn name(&self) -> &str;

    /// Tags this adapter can list, in a stable order.
    fn tags(&self) -> Vec<Tag>;

    /// Lists stubs for `tag` on `page` in document order.
    ///
    /// Fails with [`Error::UndefinedTag`] when the adapter has no template
    /// for `tag`.
    async fn article_list(&self, tag: Tag, page: u32) -> Result<Vec<Article>>;

    /// Completes a stub in place.
    ///
    /// Fails with [`Error::UndefinedArticleHref`] before any network access
    /// when `article.href` is empty. Images that cannot be localized are
    /// dropped from the content rather than failing the call.
    async fn article_detail(&self, article: &mut Article) -> Result<()>;

    /// Canonical detail URL for a stub; also the snapshot key.
    fn detail_url(&self, article: &Article) -> Result<String>;

    /// True when the detail page of `article` is already snapshotted.
    async fn has_snapshot(&self, article: &Article) -> bool;
}

/// Fields extracted from a detail page, ready to merge into the stub.
#[derive(Debug, Clone, Default)]
pub struct Detail {
    pub title: Option<String>,
    pub post_time: Option<DateTime<Local>>,
    pub tags: Vec<ArticleTag>,
    pub rendered: Rendered,
}

impl Detail {
    /// Merges into `article`. Tags and local images are appended; an absent
    /// title or post time leaves the stub's value alone.
    pub fn apply(self, article: &mut Article) {
        if let Some(title) = self.title.filter(|t| !t.is_empty()) {
            article.title = title;
        }
        if self.post_time.is_some() {
            article.post_time = self.post_time;
        }
        article.tags.extend(self.tags);
        article.content = self.rendered.html.trim().to_string();
        article.local_images.extend(self.rendered.local_images);
    }
}

/// Marks a content link as a tag link: `class="tag" data-name=.. data-tag=..`.
pub fn mark_tag(attrs: &mut Attrs, tag: &ArticleTag) {
    attrs
        .remove_all(&["href", "target", "title"])
        .add_class(TAG_CLASS)
        .set(TAG_ATTR_NAME, tag.name.as_str())
        .set(TAG_ATTR_VALUE, tag.slug.as_str());
}

/// Tag to listing-URL template map. Templates carry a `{page}` placeholder.
#[derive(Debug, Clone, Default)]
pub struct Columns(BTreeMap<Tag, &'static str>);

impl Columns {
    pub fn new(entries: &[(Tag, &'static str)]) -> Self {
        Self(entries.iter().copied().collect())
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.0.keys().copied().collect()
    }

    pub fn template(&self, tag: Tag) -> Result<&'static str> {
        self.0.get(&tag).copied().ok_or(Error::UndefinedTag)
    }
}

/// Substitutes the first `{page}` placeholder.
pub fn fill_page(template: &str, value: &str) -> String {
    template.replacen("{page}", value, 1)
}

pub fn require_href(article: &Article) -> Result<()> {
    if article.href.trim().is_empty() {
        return Err(Error::UndefinedArticleHref);
    }
    Ok(())
}

/// Minimum plain-text length an adapter demands of extracted content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentPolicy {
    pub min_chars: Option<usize>,
}

impl ContentPolicy {
    pub const fn min_chars(min: usize) -> Self {
        Self {
            min_chars: Some(min),
        }
    }

    /// Counts characters of the trimmed text.
    pub fn check(&self, text: &str) -> Result<()> {
        let Some(min) = self.min_chars else {
            return Ok(());
        };
        let chars = text.trim().chars().count();
        if chars < min {
            return Err(Error::ArticleTooShort { chars, min });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_reject_unknown_tag() {
        let cols = Columns::new(&[(Tag::Mobile, "m/{page}"), (Tag::Commerce, "c/{page}")]);
        assert_eq!(cols.tags(), vec![Tag::Commerce, Tag::Mobile]);
        assert_eq!(cols.template(Tag::Mobile).unwrap(), "m/{page}");
        assert!(matches!(cols.template(Tag::Car), Err(Error::UndefinedTag)));
    }

    #[test]
    fn test_fill_page() {
        assert_eq!(fill_page("ebiz/index{page}.html", ""), "ebiz/index.html");
        assert_eq!(fill_page("ebiz/index{page}.html", "_2"), "ebiz/index_2.html");
        assert_eq!(fill_page("page/{page}?s=x", "3"), "page/3?s=x");
    }

    #[test]
    fn test_require_href() {
        assert!(matches!(
            require_href(&Article::stub("t", "")),
            Err(Error::UndefinedArticleHref)
        ));
        assert!(require_href(&Article::stub("t", "/a.html")).is_ok());
    }

    #[test]
    fn test_detail_apply_keeps_stub_fields_when_missing() {
        let mut art = Article::stub("Listing title", "/a.html");
        art.tags.push(ArticleTag::new("from-feed", "1"));
        let detail = Detail {
            title: None,
            post_time: None,
            tags: vec![ArticleTag::new("ai", "ai")],
            rendered: Rendered {
                html: "  <p>x</p>\n".to_string(),
                text: "x".to_string(),
                local_images: vec!["/a.png".to_string()],
            },
        };
        detail.apply(&mut art);
        assert_eq!(art.title, "Listing title");
        assert_eq!(art.content, "<p>x</p>");
        assert_eq!(art.tags.len(), 2);
        assert_eq!(art.local_images, vec!["/a.png"]);
    }

    #[test]
    fn test_mark_tag() {
        let mut attrs = Attrs::default();
        attrs.set("href", "/tag/ai/").set("target", "_blank").set("class", "infotextkey");
        mark_tag(&mut attrs, &ArticleTag::new("AI", "ai"));
        assert_eq!(attrs.get("href"), None);
        assert_eq!(attrs.get("class"), Some("infotextkey tag"));
        assert_eq!(attrs.get("data-name"), Some("AI"));
        assert_eq!(attrs.get("data-tag"), Some("ai"));
    }

    #[test]
    fn test_policy_threshold() {
        let policy = ContentPolicy::min_chars(900);
        assert!(matches!(
            policy.check(&"字".repeat(800)),
            Err(Error::ArticleTooShort { chars: 800, min: 900 })
        ));
        assert!(policy.check(&"字".repeat(1000)).is_ok());
        assert!(ContentPolicy::default().check("").is_ok());
    }
}
