//! Data models shared by every adapter.
//!
//! - [`Article`]: the record a listing call creates as a stub and a detail call fills in
//! - [`ArticleTag`]: one tag link found in article content
//! - [`Category`]: publishing category metadata
//! - [`Batch`]: one collected listing page, as written to JSON
//! - [`Tag`]: the closed set of content categories adapters can list

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A collected article.
///
/// Listing produces stubs carrying only `title` and `href` (some feeds add
/// `post_time` and `tags`). A detail fetch mutates the stub in place.
///
/// `local_images` is only ever appended to by image localization, in the
/// order images appear in `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The article headline.
    pub title: String,
    /// Sanitized HTML fragment with image sources rewritten to local paths.
    pub content: String,
    pub alias: String,
    /// Tags in the order they were found; duplicates are kept.
    pub tags: Vec<ArticleTag>,
    pub category: Category,
    pub author_name: String,
    /// Publication time converted to the local time zone.
    pub post_time: Option<DateTime<Local>>,
    pub intro: String,
    /// Adapter-defined source key: a path, a composite id, or a full URL.
    pub href: String,
    /// Paths relative to the image root, e.g. `/qpic_cn/<md5>.png`.
    pub local_images: Vec<String>,
}

impl Article {
    /// Builds a listing stub.
    pub fn stub(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            ..Self::default()
        }
    }
}

/// A tag link extracted from content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleTag {
    /// Display label.
    pub name: String,
    /// Normalized identifier; empty when the source gives none.
    pub slug: String,
}

impl ArticleTag {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
        }
    }
}

/// Publishing category metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub alias: String,
    pub order: String,
    pub parent_id: i64,
    pub intro: String,
}

/// Articles completed from one listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub adapter: String,
    pub tag: Tag,
    pub page: u32,
    pub collected_at: DateTime<Local>,
    pub articles: Vec<Article>,
}

/// Content categories an adapter may be able to list.
///
/// Each adapter maps the subset it supports to a listing URL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Commerce,
    Mobile,
    Car,
    Smart,
    It,
    Telecom,
    Life,
    Sab,
    Science,
    Digital,
    Fashion,
}

impl Tag {
    pub const ALL: [Tag; 11] = [
        Tag::Commerce,
        Tag::Mobile,
        Tag::Car,
        Tag::Smart,
        Tag::It,
        Tag::Telecom,
        Tag::Life,
        Tag::Sab,
        Tag::Science,
        Tag::Digital,
        Tag::Fashion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Commerce => "commerce",
            Tag::Mobile => "mobile",
            Tag::Car => "car",
            Tag::Smart => "smart",
            Tag::It => "it",
            Tag::Telecom => "telecom",
            Tag::Life => "life",
            Tag::Sab => "sab",
            Tag::Science => "science",
            Tag::Digital => "digital",
            Tag::Fashion => "fashion",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Tag::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown tag '{s}'"))
    }
}
