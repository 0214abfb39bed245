//! v2.sohu.com adapter.
//!
//! Listings come from the public JSON feed; `href` is `<id>_<authorId>`
//! and the article lives at `https://www.sohu.com/a/<href>`. Content
//! images carry their real URL in `data-src`, AES-128-ECB encrypted and
//! base64 encoded.

use crate::adapter::{
    Columns, ContentPolicy, Detail, Engine, Standard, fill_page, require_href,
};
use crate::error::{Error, Result};
use crate::models::{Article, ArticleTag, Tag};
use crate::render::{Action, Attrs, Rendered, has_class, render_inner};
use crate::utils::truncate_for_log;
use aes::Aes128;
use aes::cipher::{BlockDecrypt, KeyInit, generic_array::GenericArray};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use pinyin::ToPinyin;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const NAME: &str = "v2_sohu_com";
pub const HOME_URL: &str = "https://v2.sohu.com/";
pub const DETAIL_BASE: &str = "https://www.sohu.com/a/";

const AES_KEY: &[u8; 16] = b"www.sohu.com6666";
const BLOCK: usize = 16;

/// Feed entries from local-news accounts are skipped.
const LOCAL_NEWS_MARKER: &str = "本地消息";
const REPORT_LINE: &str = "举报/反馈";
const SOURCE_PREFIX: &str = "来源：";

static POLICY: ContentPolicy = ContentPolicy::min_chars(900);

static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("#mp-editor").expect("selector"));
static CONTENT_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#mp-editor img").expect("selector"));
static BACK_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".backsohu").expect("selector"));
static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("selector"));

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FeedItem {
    id: i64,
    author_id: i64,
    author_name: String,
    content_type: String,
    mobile_title: String,
    public_time: i64,
    tags: Vec<FeedTag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedTag {
    name: String,
}

pub struct Sohu {
    home: String,
    detail_base: String,
    columns: Columns,
    engine: Arc<Engine>,
}

impl Sohu {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_urls(engine, HOME_URL, DETAIL_BASE)
    }

    pub fn with_urls(
        engine: Arc<Engine>,
        home: impl Into<String>,
        detail_base: impl Into<String>,
    ) -> Self {
        Self {
            home: home.into(),
            detail_base: detail_base.into(),
            columns: Columns::new(&[
                (Tag::Commerce, "public-api/feed?scene=TAG&sceneId=65777&page={page}&size=20"),
                (Tag::Mobile, "public-api/feed?scene=TAG&sceneId=59740&page={page}&size=20"),
                (Tag::It, "public-api/feed?scene=CATEGORY&sceneId=911&page={page}&size=20"),
                (Tag::Telecom, "public-api/feed?scene=CATEGORY&sceneId=934&page={page}&size=20"),
                (Tag::Smart, "public-api/feed?scene=CATEGORY&sceneId=882&page={page}&size=20"),
                (Tag::Life, "public-api/feed?scene=CATEGORY&sceneId=913&page={page}&size=20"),
                (Tag::Sab, "public-api/feed?scene=CATEGORY&sceneId=881&page={page}&size=20"),
                (Tag::Science, "public-api/feed?scene=CATEGORY&sceneId=880&page={page}&size=20"),
                (Tag::Digital, "public-api/feed?scene=CATEGORY&sceneId=936&page={page}&size=20"),
                (Tag::Fashion, "public-api/feed?scene=CATEGORY&sceneId=1045&page={page}&size=20"),
            ]),
            engine,
        }
    }

    fn list_url(&self, tag: Tag, page: u32) -> Result<String> {
        let template = self.columns.template(tag)?;
        Ok(format!("{}{}", self.home, fill_page(template, &page.to_string())))
    }
}

/// Decodes a `data-src` value into the real image URL.
pub fn decrypt_image_url(encoded: &str) -> Result<String> {
    let mut data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::ParseFailed(format!("image source is not base64: {e}")))?;
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err(Error::ParseFailed(format!(
            "image source has {} bytes, not whole blocks",
            data.len()
        )));
    }

    let cipher = Aes128::new(GenericArray::from_slice(AES_KEY));
    for chunk in data.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let pad = data.last().copied().unwrap_or_default() as usize;
    if pad == 0 || pad > BLOCK || !data[data.len() - pad..].iter().all(|b| *b as usize == pad) {
        return Err(Error::ParseFailed("image source has bad padding".into()));
    }
    data.truncate(data.len() - pad);
    String::from_utf8(data).map_err(|e| Error::ParseFailed(format!("image source: {e}")))
}

/// Feed times are seconds, occasionally milliseconds.
fn feed_time(value: i64) -> Option<DateTime<Local>> {
    if value <= 0 {
        return None;
    }
    let secs = if value > 100_000_000_000 { value / 1000 } else { value };
    Local.timestamp_opt(secs, 0).single()
}

/// Toneless pinyin of the Han characters in `name`, run together. Names
/// without any Han character are their own slug.
fn tag_slug(name: &str) -> String {
    let slug: String = name.to_pinyin().flatten().map(|p| p.plain()).collect();
    if slug.is_empty() {
        name.trim().to_string()
    } else {
        slug
    }
}

fn parse_feed(body: &str) -> Result<Vec<Article>> {
    let items: Vec<FeedItem> = serde_json::from_str(body)?;
    Ok(items
        .into_iter()
        .filter(|item| item.content_type == "article")
        .filter(|item| !item.author_name.contains(LOCAL_NEWS_MARKER))
        .map(|item| {
            let mut art = Article::stub(
                item.mobile_title.trim(),
                format!("{}_{}", item.id, item.author_id),
            );
            art.post_time = feed_time(item.public_time);
            art.author_name = item.author_name;
            art.tags = item
                .tags
                .into_iter()
                .map(|t| {
                    let slug = tag_slug(&t.name);
                    ArticleTag::new(t.name, slug)
                })
                .collect();
            art
        })
        .collect())
}

/// Fetchable URL of a content image, `None` when it has no source at all.
fn image_source(img: ElementRef<'_>) -> Option<Result<String>> {
    if let Some(encoded) = img.value().attr("data-src") {
        return Some(decrypt_image_url(encoded));
    }
    img.value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Ok(s.to_string()))
}

/// Decode failures are logged here only; rendering drops those images silently.
fn image_refs(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&CONTENT_IMG)
        .filter_map(image_source)
        .filter_map(|src| {
            src.inspect_err(|e| warn!(error = %e, "Undecodable image source"))
                .ok()
        })
        .collect()
}

fn parse_detail(html: &str, localized: &HashMap<String, String>) -> Result<Detail> {
    let doc = Html::parse_document(html);
    // redirect stubs and removed articles have no editor body; they
    // render empty and fail the length check
    let Some(content) = doc.select(&CONTENT).next() else {
        debug!("No #mp-editor in page");
        return Ok(Detail {
            title: None,
            post_time: None,
            tags: Vec::new(),
            rendered: Rendered::default(),
        });
    };

    let mut dropped: HashSet<_> = content
        .select(&BACK_LINK)
        .filter_map(|el| el.parent())
        .map(|parent| parent.id())
        .collect();

    // trailing report line, then the source line above it
    let mut paragraphs: Vec<_> = content
        .select(&P)
        .filter(|p| p.value().attr("data-role").is_none())
        .filter(|p| !p.ancestors().any(|a| dropped.contains(&a.id())))
        .collect();
    let text_of = |p: &ElementRef<'_>| p.text().collect::<String>().trim().to_string();
    if paragraphs.last().is_some_and(|p| text_of(p) == REPORT_LINE) {
        dropped.extend(paragraphs.pop().map(|p| p.id()));
    }
    if paragraphs.last().is_some_and(|p| text_of(p).starts_with(SOURCE_PREFIX)) {
        dropped.extend(paragraphs.pop().map(|p| p.id()));
    }

    let rendered = render_inner(content, |el| {
        if dropped.contains(&el.id()) {
            return Action::Drop;
        }
        match el.value().name() {
            "img" => {
                let Some(local_path) = image_source(el)
                    .and_then(Result::ok)
                    .and_then(|src| localized.get(&src))
                else {
                    return Action::Drop;
                };
                let mut attrs = Attrs::of(el);
                attrs.remove("data-src");
                if attrs
                    .get("alt")
                    .is_some_and(|alt| alt.is_empty() || alt.contains("http://"))
                {
                    attrs.remove("alt");
                }
                Action::Image {
                    attrs,
                    local_path: local_path.clone(),
                }
            }
            "a" => Action::Unwrap,
            "p" if el.value().attr("data-role").is_some() => Action::Drop,
            "p" => {
                let mut attrs = Attrs::of(el);
                if has_class(el, "ql-align-center") {
                    attrs.remove_class("ql-align-center").set("style", "text-align: center;");
                }
                if has_class(el, "ql-align-justify") {
                    attrs.remove_class("ql-align-justify").set("style", "text-align: justify;");
                }
                Action::Keep(attrs)
            }
            _ => Action::keep(el),
        }
    });

    Ok(Detail {
        title: None,
        post_time: None,
        tags: Vec::new(),
        rendered,
    })
}

#[async_trait]
impl Standard for Sohu {
    fn name(&self) -> &str {
        NAME
    }

    fn tags(&self) -> Vec<Tag> {
        self.columns.tags()
    }

    #[instrument(level = "info", skip(self), fields(adapter = NAME))]
    async fn article_list(&self, tag: Tag, page: u32) -> Result<Vec<Article>> {
        let url = self.list_url(tag, page)?;
        let body = self.engine.http.get_listing(&url).await?;
        let articles = parse_feed(&body).inspect_err(|e| {
            warn!(
                error = %e,
                body_preview = %truncate_for_log(&body, 300),
                "Feed did not parse"
            );
        })?;
        info!(count = articles.len(), %url, "Listed sohu articles");
        Ok(articles)
    }

    /// Content is filled in even when the length check then fails.
    #[instrument(level = "info", skip_all, fields(adapter = NAME, href = %article.href))]
    async fn article_detail(&self, article: &mut Article) -> Result<()> {
        require_href(article)?;
        let url = self.detail_url(article)?;
        let raw = self.engine.snapshots.fetch_or_load(NAME, &url).await?;
        let html = String::from_utf8_lossy(&raw).into_owned();

        let localized = self.engine.images.localize_each(image_refs(&html)).await;
        let detail = parse_detail(&html, &localized)?;
        let checked = POLICY.check(&detail.rendered.text);
        detail.apply(article);
        debug!(
            images = article.local_images.len(),
            ok = checked.is_ok(),
            "Parsed sohu article"
        );
        checked
    }

    fn detail_url(&self, article: &Article) -> Result<String> {
        require_href(article)?;
        Ok(format!("{}{}", self.detail_base, article.href.trim()))
    }

    async fn has_snapshot(&self, article: &Article) -> bool {
        match self.detail_url(article) {
            Ok(url) => self.engine.snapshots.contains(NAME, &url).await,
            Err(_) => false,
        }
    }
}
