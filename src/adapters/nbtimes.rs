//! nbtimes.net adapter.
//!
//! Listing is the site search (`page/{page}?s=<keyword>`); `href` is the
//! absolute article URL and doubles as the canonical detail URL.

use crate::adapter::{Columns, Detail, Engine, Standard, fill_page, mark_tag, require_href};
use crate::error::{Error, Result};
use crate::models::{Article, ArticleTag, Tag};
use crate::render::{Action, Attrs, has_class, render_inner, squash_whitespace};
use crate::utils::slug_after;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

pub const NAME: &str = "nbtimes_net";
pub const HOME_URL: &str = "https://www.nbtimes.net/";

/// Editorial banners stripped from content.
const BANNERS: [&str; 2] = ["【蓝科技综述】", "【蓝科技观察】"];

static LIST_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".post-loop-default li.item").expect("selector"));
static ITEM_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse(".item-title a").expect("selector"));
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("selector"));
static ENTRY_DATE: Lazy<Selector> = Lazy::new(|| Selector::parse(".entry-date").expect("selector"));
static CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse(".entry-content").expect("selector"));
static CONTENT_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".entry-content img").expect("selector"));
static DIV: Lazy<Selector> = Lazy::new(|| Selector::parse("div").expect("selector"));
static P: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("selector"));

pub struct Nbtimes {
    home: String,
    columns: Columns,
    engine: Arc<Engine>,
}

impl Nbtimes {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_home(engine, HOME_URL)
    }

    pub fn with_home(engine: Arc<Engine>, home: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            columns: Columns::new(&[
                (Tag::Commerce, "page/{page}?s=电商"),
                (Tag::Mobile, "page/{page}?s=手机"),
                (Tag::Car, "page/{page}?s=汽车"),
                (Tag::Smart, "page/{page}?s=智能"),
            ]),
            engine,
        }
    }

    fn list_url(&self, tag: Tag, page: u32) -> Result<String> {
        let template = self.columns.template(tag)?;
        Ok(format!("{}{}", self.home, fill_page(template, &page.to_string())))
    }
}

fn parse_list(html: &str) -> Vec<Article> {
    let doc = Html::parse_document(html);
    doc.select(&LIST_ITEM)
        .filter_map(|li| {
            let a = li.select(&ITEM_LINK).next()?;
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            Some(Article::stub(squash_whitespace(&a.text().collect::<String>()), href))
        })
        .collect()
}

fn image_refs(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&CONTENT_IMG)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn parent_has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| has_class(p, class))
}

fn parse_detail(html: &str, localized: &HashMap<String, String>) -> Result<Detail> {
    let doc = Html::parse_document(html);
    let content = doc
        .select(&CONTENT)
        .next()
        .ok_or_else(|| Error::ParseFailed("nbtimes: .entry-content not found".into()))?;

    let title = doc
        .select(&OG_TITLE)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|t| t.trim().to_string());
    let post_time = doc
        .select(&ENTRY_DATE)
        .next()
        .and_then(|d| d.value().attr("datetime"))
        .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
        .map(|d| d.with_timezone(&Local))
        .or_else(|| Some(Local::now()));

    // the trailing div holds share widgets; the last paragraph left outside
    // it is the source line
    let last_div = content.select(&DIV).last();
    let last_p = content
        .select(&P)
        .filter(|p| !last_div.is_some_and(|d| p.ancestors().any(|a| a.id() == d.id())))
        .last();
    let trailing: Vec<_> = [last_div, last_p].into_iter().flatten().map(|el| el.id()).collect();

    let mut tags = Vec::new();
    let mut rendered = render_inner(content, |el| {
        if trailing.contains(&el.id()) {
            return Action::Drop;
        }
        match el.value().name() {
            "div" if has_class(el, "pgc-img") => Action::Unwrap,
            "span" if has_class(el, "wpcom_tag_link") => Action::Unwrap,
            "img" => {
                let src = el.value().attr("src").unwrap_or_default();
                let Some(local_path) = localized.get(src) else {
                    return Action::Drop;
                };
                let mut attrs = Attrs::of(el);
                attrs.remove_all(&["data-ic", "data-ic-uri"]);
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
            "a" if parent_has_class(el, "wpcom_tag_link") => {
                let href = el.value().attr("href").unwrap_or_default();
                let tag = ArticleTag::new(
                    squash_whitespace(&el.text().collect::<String>()),
                    slug_after(href, "/tag/"),
                );
                let mut attrs = Attrs::of(el);
                mark_tag(&mut attrs, &tag);
                tags.push(tag);
                Action::Keep(attrs)
            }
            "a" => Action::Unwrap,
            "p" => {
                let mut attrs = Attrs::of(el);
                attrs.remove("data-track");
                Action::Keep(attrs)
            }
            _ => Action::keep(el),
        }
    });
    for banner in BANNERS {
        rendered.html = rendered.html.replace(banner, "");
        rendered.text = rendered.text.replace(banner, "");
    }

    Ok(Detail {
        title,
        post_time,
        tags,
        rendered,
    })
}

#[async_trait]
impl Standard for Nbtimes {
    fn name(&self) -> &str {
        NAME
    }

    fn tags(&self) -> Vec<Tag> {
        self.columns.tags()
    }

    #[instrument(level = "info", skip(self), fields(adapter = NAME))]
    async fn article_list(&self, tag: Tag, page: u32) -> Result<Vec<Article>> {
        let url = self.list_url(tag, page)?;
        let html = self.engine.http.get_listing(&url).await?;
        let articles = parse_list(&html);
        info!(count = articles.len(), %url, "Listed nbtimes articles");
        Ok(articles)
    }

    #[instrument(level = "info", skip_all, fields(adapter = NAME, href = %article.href))]
    async fn article_detail(&self, article: &mut Article) -> Result<()> {
        require_href(article)?;
        let url = self.detail_url(article)?;
        let raw = self.engine.snapshots.fetch_or_load(NAME, &url).await?;
        let html = String::from_utf8_lossy(&raw).into_owned();

        let localized = self.engine.images.localize_each(image_refs(&html)).await;
        let detail = parse_detail(&html, &localized)?;
        detail.apply(article);
        debug!(
            tags = article.tags.len(),
            images = article.local_images.len(),
            "Parsed nbtimes article"
        );
        Ok(())
    }

    fn detail_url(&self, article: &Article) -> Result<String> {
        require_href(article)?;
        let href = article.href.trim();
        Url::parse(href)?;
        Ok(href.to_string())
    }

    async fn has_snapshot(&self, article: &Article) -> bool {
        match self.detail_url(article) {
            Ok(url) => self.engine.snapshots.contains(NAME, &url).await,
            Err(_) => false,
        }
    }
}
