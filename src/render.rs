//! Re-serializes a parsed content subtree while rewriting it.
//!
//! `scraper` documents are read-only, so sanitizing content means walking
//! the subtree in document order and writing fresh HTML. For every element
//! the caller's visitor picks an [`Action`]. Comments are never emitted.

use scraper::{ElementRef, Node};

/// Elements that never have a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements dropped regardless of what the visitor says.
const ALWAYS_DROPPED: [&str; 5] = ["script", "style", "noscript", "iframe", "template"];

pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Ordered attribute list for an element being rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attrs(Vec<(String, String)>);

impl Attrs {
    pub fn of(el: ElementRef<'_>) -> Self {
        Self(
            el.value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
        self
    }

    pub fn remove(&mut self, name: &str) -> &mut Self {
        self.0.retain(|(k, _)| k != name);
        self
    }

    pub fn remove_all(&mut self, names: &[&str]) -> &mut Self {
        self.0.retain(|(k, _)| !names.contains(&k.as_str()));
        self
    }

    pub fn add_class(&mut self, class: &str) -> &mut Self {
        let mut classes: Vec<String> = self
            .get("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
        self.set("class", classes.join(" "))
    }

    /// Removes one class; drops the attribute when nothing is left.
    pub fn remove_class(&mut self, class: &str) -> &mut Self {
        let Some(current) = self.get("class").map(str::to_string) else {
            return self;
        };
        let rest: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        if rest.is_empty() {
            self.remove("class")
        } else {
            self.set("class", rest.join(" "))
        }
    }

    fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.0.iter()
    }
}

/// What to do with one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit the element with these attributes, then its children.
    Keep(Attrs),
    /// Emit nothing for the element or its subtree.
    Drop,
    /// Emit only the children.
    Unwrap,
    /// Emit the element with `src` pointing at `local_path` and record the
    /// path as a local image.
    Image { attrs: Attrs, local_path: String },
}

impl Action {
    pub fn keep(el: ElementRef<'_>) -> Self {
        Action::Keep(Attrs::of(el))
    }
}

/// Output of [`render_inner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    /// Concatenated text of everything emitted.
    pub text: String,
    /// Local paths of emitted images, in document order.
    pub local_images: Vec<String>,
}

/// Renders the children of `root` (its inner HTML).
pub fn render_inner<'a, F>(root: ElementRef<'a>, mut visit: F) -> Rendered
where
    F: FnMut(ElementRef<'a>) -> Action,
{
    let mut out = Rendered::default();
    walk(root, &mut visit, &mut out);
    out
}

fn walk<'a, F>(el: ElementRef<'a>, visit: &mut F, out: &mut Rendered)
where
    F: FnMut(ElementRef<'a>) -> Action,
{
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.html.push_str(&escape_text(text));
                out.text.push_str(text);
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    emit(child_el, visit, out);
                }
            }
            _ => {}
        }
    }
}

fn emit<'a, F>(el: ElementRef<'a>, visit: &mut F, out: &mut Rendered)
where
    F: FnMut(ElementRef<'a>) -> Action,
{
    let name = el.value().name();
    if ALWAYS_DROPPED.contains(&name) {
        return;
    }
    match visit(el) {
        Action::Drop => {}
        Action::Unwrap => walk(el, visit, out),
        Action::Keep(attrs) => {
            open_tag(name, &attrs, None, out);
            close_tag(el, name, visit, out);
        }
        Action::Image { attrs, local_path } => {
            open_tag(name, &attrs, Some(&local_path), out);
            out.local_images.push(local_path);
            close_tag(el, name, visit, out);
        }
    }
}

fn open_tag(name: &str, attrs: &Attrs, src: Option<&str>, out: &mut Rendered) {
    out.html.push('<');
    out.html.push_str(name);
    if let Some(src) = src {
        push_attr("src", src, out);
    }
    for (k, v) in attrs.iter() {
        if src.is_some() && k == "src" {
            continue;
        }
        push_attr(k, v, out);
    }
    out.html.push('>');
}

fn close_tag<'a, F>(el: ElementRef<'a>, name: &str, visit: &mut F, out: &mut Rendered)
where
    F: FnMut(ElementRef<'a>) -> Action,
{
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    walk(el, visit, out);
    out.html.push_str("</");
    out.html.push_str(name);
    out.html.push('>');
}

fn push_attr(k: &str, v: &str, out: &mut Rendered) {
    out.html.push(' ');
    out.html.push_str(k);
    out.html.push_str("=\"");
    out.html.push_str(&escape_attr(v));
    out.html.push('"');
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Collapses runs of whitespace and trims, for length checks and titles.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn with_root<R>(html: &str, f: impl FnOnce(ElementRef<'_>) -> R) -> R {
        let doc = Html::parse_document(html);
        let sel = Selector::parse("#root").unwrap();
        let root = doc.select(&sel).next().unwrap();
        f(root)
    }

    #[test]
    fn test_keep_everything_round_trips() {
        let out = with_root(
            r#"<div id="root"><p class="a">Hi <b>there</b></p><br><!-- note --></div>"#,
            |root| render_inner(root, Action::keep),
        );
        assert_eq!(out.html, r#"<p class="a">Hi <b>there</b></p><br>"#);
        assert_eq!(out.text, "Hi there");
    }

    #[test]
    fn test_drop_and_unwrap() {
        let out = with_root(
            r#"<div id="root"><a href="/x">link <i>text</i></a><script>bad()</script></div>"#,
            |root| {
                render_inner(root, |el| match el.value().name() {
                    "a" => Action::Unwrap,
                    "script" => Action::Drop,
                    _ => Action::keep(el),
                })
            },
        );
        assert_eq!(out.html, "link <i>text</i>");
        assert_eq!(out.text, "link text");
    }

    #[test]
    fn test_image_action_records_local_paths_in_order() {
        let out = with_root(
            r#"<div id="root"><img src="http://a/1.png" alt=""><p><img src="http://a/2.png"></p></div>"#,
            |root| {
                let mut n = 0;
                render_inner(root, |el| {
                    if el.value().name() == "img" {
                        n += 1;
                        let mut attrs = Attrs::of(el);
                        attrs.remove("alt");
                        Action::Image {
                            attrs,
                            local_path: format!("/local/{n}.png"),
                        }
                    } else {
                        Action::keep(el)
                    }
                })
            },
        );
        assert_eq!(
            out.html,
            r#"<img src="/local/1.png"><p><img src="/local/2.png"></p>"#
        );
        assert_eq!(out.local_images, vec!["/local/1.png", "/local/2.png"]);
    }

    #[test]
    fn test_scripts_never_emitted() {
        let out = with_root(
            r#"<div id="root"><p>a</p><script>x()</script><style>p{}</style></div>"#,
            |root| render_inner(root, Action::keep),
        );
        assert_eq!(out.html, "<p>a</p>");
    }

    #[test]
    fn test_escaping() {
        let out = with_root(
            r#"<div id="root"><span title="a &quot;q&quot; &amp; b">1 &lt; 2 &amp; 3</span></div>"#,
            |root| render_inner(root, Action::keep),
        );
        assert_eq!(
            out.html,
            r#"<span title="a &quot;q&quot; &amp; b">1 &lt; 2 &amp; 3</span>"#
        );
        assert_eq!(out.text, "1 < 2 & 3");
    }

    #[test]
    fn test_attrs_class_helpers() {
        let mut attrs = Attrs::default();
        attrs.add_class("infotextkey").add_class("x");
        assert_eq!(attrs.get("class"), Some("infotextkey x"));
        attrs.remove_class("infotextkey").add_class("tag");
        assert_eq!(attrs.get("class"), Some("x tag"));
        attrs.remove_class("x").remove_class("tag");
        assert_eq!(attrs.get("class"), None);

        attrs.set("data-name", "a").set("data-name", "b");
        assert_eq!(attrs.get("data-name"), Some("b"));
        attrs.remove_all(&["data-name"]);
        assert_eq!(attrs, Attrs::default());
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  a \n\t b  "), "a b");
    }
}
