//! techsir.com adapter.
//!
//! Listing pages are static HTML: `ebiz/index.html` for page 1 and
//! `ebiz/index_2.html` onward. `href` is the link as found on the listing
//! page and is resolved against the home URL.

use crate::adapter::{
    Columns, Detail, Engine, Standard, fill_page, mark_tag, require_href,
};
use crate::error::{Error, Result};
use crate::models::{Article, ArticleTag, Tag};
use crate::render::{Action, Attrs, has_class, render_inner, squash_whitespace};
use crate::utils::slug_after;
use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

pub const NAME: &str = "techsir_com";
pub const HOME_URL: &str = "https://www.techsir.com/";

static LIST_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".title.h4").expect("selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse(".title").expect("selector"));
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse(".time").expect("selector"));
static CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".kg-card-markdown").expect("selector"));
static CONTENT_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".kg-card-markdown img").expect("selector"));
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("regex"));

pub struct Techsir {
    home: String,
    columns: Columns,
    engine: Arc<Engine>,
}

impl Techsir {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::with_home(engine, HOME_URL)
    }

    pub fn with_home(engine: Arc<Engine>, home: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            columns: Columns::new(&[
                (Tag::Commerce, "ebiz/index{page}.html"),
                (Tag::Mobile, "shuma/index{page}.html"),
                (Tag::Car, "chanye/car/index{page}.html"),
            ]),
            engine,
        }
    }

    /// Page 1 has no page segment.
    fn list_url(&self, tag: Tag, page: u32) -> Result<String> {
        let template = self.columns.template(tag)?;
        let segment = if page <= 1 {
            String::new()
        } else {
            format!("_{page}")
        };
        Ok(format!("{}{}", self.home, fill_page(template, &segment)))
    }
}

fn parse_list(html: &str) -> Vec<Article> {
    let doc = Html::parse_document(html);
    doc.select(&LIST_TITLE)
        .filter_map(|h| {
            let a = h.select(&LINK).next()?;
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

/// Dates carry no zone and are read as UTC midnight.
fn parse_post_time(text: &str) -> Option<chrono::DateTime<Local>> {
    let found = DATE.find(text)?;
    let date = NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d").ok()?;
    let utc = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(utc.with_timezone(&Local))
}

fn parse_detail(html: &str, localized: &HashMap<String, String>) -> Result<Detail> {
    let doc = Html::parse_document(html);
    let content = doc
        .select(&CONTENT)
        .next()
        .ok_or_else(|| Error::ParseFailed("techsir: .kg-card-markdown not found".into()))?;

    let title = doc
        .select(&TITLE)
        .next()
        .map(|t| squash_whitespace(&t.text().collect::<String>()));
    let post_time = doc
        .select(&TIME)
        .next()
        .and_then(|t| parse_post_time(&t.text().collect::<String>()))
        .or_else(|| Some(Local::now()));

    let mut tags = Vec::new();
    let rendered = render_inner(content, |el| match el.value().name() {
        "img" => {
            let src = el.value().attr("src").unwrap_or_default();
            let Some(local_path) = localized.get(src) else {
                return Action::Drop;
            };
            let mut attrs = Attrs::of(el);
            attrs.remove_all(&["data-original", "data-link", "srcset", "sizes", "title"]);
            if attrs.get("alt").is_some_and(str::is_empty) {
                attrs.remove("alt");
            }
            Action::Image {
                attrs,
                local_path: local_path.clone(),
            }
        }
        "a" if has_class(el, "infotextkey") => {
            let href = el.value().attr("href").unwrap_or_default();
            let tag = ArticleTag::new(
                squash_whitespace(&el.text().collect::<String>()),
                slug_after(href, "/s/"),
            );
            let mut attrs = Attrs::of(el);
            attrs.remove_class("infotextkey");
            mark_tag(&mut attrs, &tag);
            tags.push(tag);
            Action::Keep(attrs)
        }
        "a" => {
            let href = el.value().attr("href").unwrap_or_default();
            if !href.contains("/tag/") {
                return Action::Unwrap;
            }
            let name = squash_whitespace(&el.text().collect::<String>());
            if name.is_empty() {
                return Action::Drop;
            }
            let tag = ArticleTag::new(name, "");
            let mut attrs = Attrs::of(el);
            attrs.remove_all(&["data-group", "data-id", "data-index"]);
            mark_tag(&mut attrs, &tag);
            tags.push(tag);
            Action::Keep(attrs)
        }
        "p" => {
            let mut attrs = Attrs::of(el);
            attrs.remove("data-track");
            Action::Keep(attrs)
        }
        _ => Action::keep(el),
    });

    Ok(Detail {
        title,
        post_time,
        tags,
        rendered,
    })
}

#[async_trait]
impl Standard for Techsir {
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
        info!(count = articles.len(), %url, "Listed techsir articles");
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
            "Parsed techsir article"
        );
        Ok(())
    }

    fn detail_url(&self, article: &Article) -> Result<String> {
        require_href(article)?;
        Ok(Url::parse(&self.home)?.join(article.href.trim())?.to_string())
    }

    async fn has_snapshot(&self, article: &Article) -> bool {
        match self.detail_url(article) {
            Ok(url) => self.engine.snapshots.contains(NAME, &url).await,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(tmp: &TempDir) -> Arc<Engine> {
        let config = Config {
            image_root: tmp.path().join("img"),
            snapshot_root: tmp.path().join("snap"),
            list_timeout_secs: 5,
            fetch_timeout_secs: 30,
            ..Config::default()
        };
        Arc::new(Engine::new(config).unwrap())
    }

    const LIST_HTML: &str = r#"
        <div>
          <h2 class="title h4"><a href="/ebiz/101.html"> First
             story </a></h2>
          <h2 class="title"><a href="/ebiz/skip.html">Not a list entry</a></h2>
          <h2 class="title h4"><a href="/ebiz/102.html">Second</a></h2>
          <h2 class="title h4"><a href="">Empty</a></h2>
        </div>"#;

    #[test]
    fn test_list_url_page_segment() {
        let tmp = TempDir::new().unwrap();
        let t = Techsir::new(engine(&tmp));
        assert_eq!(
            t.list_url(Tag::Commerce, 1).unwrap(),
            "https://www.techsir.com/ebiz/index.html"
        );
        assert_eq!(
            t.list_url(Tag::Commerce, 3).unwrap(),
            "https://www.techsir.com/ebiz/index_3.html"
        );
        assert!(matches!(t.list_url(Tag::Fashion, 1), Err(Error::UndefinedTag)));
    }

    #[test]
    fn test_detail_url_resolves_against_home() {
        let tmp = TempDir::new().unwrap();
        let t = Techsir::new(engine(&tmp));
        assert_eq!(
            t.detail_url(&Article::stub("t", "/ebiz/1.html")).unwrap(),
            "https://www.techsir.com/ebiz/1.html"
        );
        assert_eq!(
            t.detail_url(&Article::stub("t", "ebiz/1.html")).unwrap(),
            "https://www.techsir.com/ebiz/1.html"
        );
        assert_eq!(
            t.detail_url(&Article::stub("t", "https://m.techsir.com/ebiz/1.html")).unwrap(),
            "https://m.techsir.com/ebiz/1.html"
        );
    }

    #[test]
    fn test_parse_list_in_document_order() {
        let list = parse_list(LIST_HTML);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "First story");
        assert_eq!(list[0].href, "/ebiz/101.html");
        assert_eq!(list[1].href, "/ebiz/102.html");
    }

    #[test]
    fn test_parse_post_time() {
        let t = parse_post_time(" 发布于 2022-04-20 ").unwrap();
        assert_eq!(t.with_timezone(&Utc).format("%Y-%m-%d %H:%M").to_string(), "2022-04-20 00:00");
        assert!(parse_post_time("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_article_list_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ebiz/index_2.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LIST_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let t = Techsir::with_home(engine(&tmp), format!("{}/", server.uri()));
        let list = t.article_list(Tag::Commerce, 2).await.unwrap();
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_undefined_tag() {
        let tmp = TempDir::new().unwrap();
        let t = Techsir::new(engine(&tmp));
        assert!(matches!(
            t.article_list(Tag::Science, 1).await,
            Err(Error::UndefinedTag)
        ));
    }

    #[tokio::test]
    async fn test_empty_href_fails_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let t = Techsir::with_home(engine(&tmp), format!("{}/", server.uri()));
        let mut art = Article::stub("t", "");
        assert!(matches!(
            t.article_detail(&mut art).await,
            Err(Error::UndefinedArticleHref)
        ));
    }

    #[tokio::test]
    async fn test_article_detail_localizes_images_and_tags() {
        let server = MockServer::start().await;
        let detail_html = format!(
            r#"<html><body>
            <h1 class="title"> Big   news </h1>
            <span class="time">2022-04-20</span>
            <div class="kg-card-markdown">
              <p data-track="1">Intro <a class="infotextkey" href="/s/5g/" target="_blank">5G</a></p>
              <figure><img src="{uri}/img/a.jpg" alt="" srcset="x 2x" data-original="y"></figure>
              <p><img src="ftp://bad/host.png"></p>
              <p>See <a href="/tag/phones/">Phones</a> and <a href="https://other.example/">elsewhere</a></p>
              <img src="{uri}/img/a.jpg" alt="again">
              <script>track()</script>
            </div></body></html>"#,
            uri = server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/ebiz/101.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_html))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let t = Techsir::with_home(engine(&tmp), format!("{}/", server.uri()));
        let mut art = Article::stub("from list", "/ebiz/101.html");
        assert!(!t.has_snapshot(&art).await);
        t.article_detail(&mut art).await.unwrap();
        assert!(t.has_snapshot(&art).await);

        assert_eq!(art.title, "Big news");
        assert!(art.post_time.is_some());
        assert_eq!(
            art.tags,
            vec![ArticleTag::new("5G", "5g"), ArticleTag::new("Phones", "")]
        );
        assert_eq!(art.local_images, vec!["/img/a.jpg", "/img/a.jpg"]);
        assert_eq!(art.content.matches("<img").count(), art.local_images.len());
        assert!(art.content.contains(r#"<img src="/img/a.jpg">"#));
        assert!(art.content.contains(r#"<img src="/img/a.jpg" alt="again">"#));
        assert!(art.content.contains(r#"class="tag" data-name="5G" data-tag="5g""#));
        assert!(!art.content.contains("ftp://"));
        assert!(!art.content.contains("data-track"));
        assert!(!art.content.contains("track()"));
        assert!(art.content.contains("and elsewhere"));
        assert!(tmp.path().join("img/img/a.jpg").exists());

        // second run: snapshot and image both on disk, no new requests
        let mut again = Article::stub("from list", "/ebiz/101.html");
        t.article_detail(&mut again).await.unwrap();
        assert_eq!(again.content, art.content);
    }
}
