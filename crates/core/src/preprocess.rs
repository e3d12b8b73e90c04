//! Page preparation before scoring.
//!
//! Unwraps double-escaped feed bodies, resolves relative URLs against the
//! page URL, and strips markup that never holds article content.

use std::borrow::Cow;
use std::sync::LazyLock;

use lol_html::html_content::ContentType;
use regex::Regex;
use url::Url;

use crate::parse::Document;
use crate::urls::{absolutize, absolutize_srcset};

static COMMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

static HIDDEN_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

static UNLIKELY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|shoutbox|sidebar|sponsor|ad-break|agegate|pagination|pager|popup)",
    )
    .unwrap()
});

static MAYBE_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(and|article|body|column|content|main|shadow|entry|post|story)").unwrap());

/// Elements never unwrapped as unlikely candidates.
const UNLIKELY_EXEMPT: &[&str] = &["html", "body", "article", "main", "a", "img", "figure", "picture", "table"];

/// Attributes holding a single URL.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "data-src", "data-lazy-src", "data-original", "poster"];

/// Attributes holding a `srcset` list.
const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset", "data-lazy-srcset"];

/// Which cleanup steps run before scoring.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub remove_scripts: bool,
    pub remove_styles: bool,
    pub remove_svg: bool,
    pub remove_canvas: bool,
    /// Unwrap elements whose class/id reads as boilerplate.
    pub remove_unlikely: bool,
    /// Skip unwrapping when the class/id also reads as content.
    pub keep_positive: bool,
    /// Drop `display:none` and `visibility:hidden` subtrees.
    pub remove_hidden: bool,
    /// Drop `<aside>` subtrees.
    pub remove_asides: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_scripts: true,
            remove_styles: true,
            remove_svg: true,
            remove_canvas: true,
            remove_unlikely: true,
            keep_positive: true,
            remove_hidden: true,
            remove_asides: true,
        }
    }
}

/// Runs a streaming `lol_html` rewrite, returning the input unchanged on failure.
pub(crate) fn rewrite_html<'h>(
    html: &str, handlers: Vec<(Cow<'_, lol_html::Selector>, lol_html::ElementContentHandlers<'h>)>,
) -> String {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings { element_content_handlers: handlers, ..Default::default() },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if let Err(e) = rewriter.write(html.as_bytes()) {
        tracing::debug!(error = %e, "html rewrite failed");
        return html.to_string();
    }
    if let Err(e) = rewriter.end() {
        tracing::debug!(error = %e, "html rewrite failed");
        return html.to_string();
    }

    match String::from_utf8(output) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Strips non-content markup from a page before candidate scoring.
pub fn preprocess_html(html: &str, config: &PreprocessConfig) -> String {
    let mut processed = remove_unwanted_tags(html, config);
    processed = COMMENTS.replace_all(&processed, "").into_owned();

    if config.remove_unlikely {
        processed = remove_unlikely_candidates(&processed, config.keep_positive);
    }
    if config.remove_hidden {
        processed = remove_hidden_elements(&processed);
    }
    processed
}

fn remove_unwanted_tags(html: &str, config: &PreprocessConfig) -> String {
    let mut selectors = Vec::new();
    if config.remove_scripts {
        selectors.push("script");
    }
    if config.remove_styles {
        selectors.push("style");
        selectors.push("link[rel=stylesheet]");
    }
    if config.remove_svg {
        selectors.push("svg");
    }
    if config.remove_canvas {
        selectors.push("canvas");
    }
    if config.remove_asides {
        selectors.push("aside");
    }
    if selectors.is_empty() {
        return html.to_string();
    }

    let handlers = selectors
        .into_iter()
        .map(|selector| {
            lol_html::element!(selector, |el| {
                el.remove();
                Ok(())
            })
        })
        .collect();
    rewrite_html(html, handlers)
}

fn remove_unlikely_candidates(html: &str, keep_positive: bool) -> String {
    let is_unlikely = |token: &str| UNLIKELY.is_match(token) && !(keep_positive && MAYBE_CANDIDATE.is_match(token));

    rewrite_html(
        html,
        vec![lol_html::element!("*", move |el| {
            if UNLIKELY_EXEMPT.contains(&el.tag_name().as_str()) || el.get_attribute("role").as_deref() == Some("main")
            {
                return Ok(());
            }
            let id = el.get_attribute("id").unwrap_or_default();
            let class = el.get_attribute("class").unwrap_or_default();
            if (!id.is_empty() && is_unlikely(id.as_str())) || class.split_whitespace().any(is_unlikely) {
                el.remove_and_keep_content();
            }
            Ok(())
        })],
    )
}

fn remove_hidden_elements(html: &str) -> String {
    rewrite_html(
        html,
        vec![lol_html::element!("[style]", |el| {
            if let Some(style) = el.get_attribute("style")
                && HIDDEN_STYLE.is_match(&style)
            {
                el.remove();
            }
            Ok(())
        })],
    )
}

/// Returns the inner markup when a feed body arrived double-escaped: the
/// body's only child is a text node that itself looks like HTML.
pub fn unwrap_escaped_markup(html: &str) -> Option<String> {
    let doc = Document::parse(html);
    let body = doc.body()?;

    let mut children = body
        .node()
        .children()
        .filter(|child| child.value().as_text().is_none_or(|t| !t.trim().is_empty()));
    let only = children.next()?;
    if children.next().is_some() {
        return None;
    }

    let text = only.value().as_text()?.trim();
    (text.starts_with('<') && text.contains("</")).then(|| text.to_string())
}

/// Makes every URL-bearing attribute absolute against `base`.
pub fn absolutize_urls(html: &str, base: &Url) -> String {
    rewrite_html(
        html,
        vec![lol_html::element!("*", |el| {
            for name in URL_ATTRIBUTES {
                if let Some(value) = el.get_attribute(name) {
                    let resolved = absolutize(Some(base), &value);
                    if resolved != value {
                        el.set_attribute(name, &resolved).ok();
                    }
                }
            }
            for name in SRCSET_ATTRIBUTES {
                if let Some(value) = el.get_attribute(name) {
                    el.set_attribute(name, &absolutize_srcset(Some(base), &value)).ok();
                }
            }
            Ok(())
        })],
    )
}

/// Injects `<base href>` as the first child of `<head>`, replacing any existing one.
pub fn inject_base(html: &str, base: &Url) -> String {
    let tag = format!(r#"<base href="{}">"#, html_escape::encode_double_quoted_attribute(base.as_str()));
    rewrite_html(
        html,
        vec![
            lol_html::element!("base", |el| {
                el.remove();
                Ok(())
            }),
            lol_html::element!("head", |el| {
                el.prepend(&tag, ContentType::Html);
                Ok(())
            }),
        ],
    )
}
