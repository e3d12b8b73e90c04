//! Repairs for deferred media: `<noscript>` fallbacks, placeholder sources
//! and lazy iframes.

use std::collections::{HashMap, VecDeque};

use url::Url;

use super::heuristics::{LAZY_SOURCE_ATTRS, data_source, is_placeholder_url};
use super::recover::article_container;
use crate::Result;
use crate::dom_tree::DomEdits;
use crate::parse::Document;
use crate::preprocess::rewrite_html;
use crate::urls::{absolutize, absolutize_srcset, is_data_uri, normalize_image_url, parse_srcset};

/// Resolves a URL-bearing image attribute against the page URL. `<noscript>`
/// content is raw text to streaming rewriters, so it misses page-level
/// resolution.
fn resolve_image_attr(name: &str, value: &str, base: Option<&Url>) -> String {
    if name.ends_with("srcset") {
        absolutize_srcset(base, value)
    } else if name == "src" || LAZY_SOURCE_ATTRS.contains(&name) {
        absolutize(base, value)
    } else {
        value.to_string()
    }
}

/// Replaces `<noscript>` blocks that hold an image with a real `<img>`
/// carrying the same attributes, URLs resolved against `base`.
pub fn repair_noscript(content: &str, base: Option<&Url>) -> Result<String> {
    let doc = Document::parse_fragment(content);
    let mut edits = DomEdits::new();
    for noscript in doc.select("noscript")? {
        let inner = Document::parse_fragment(&noscript.text());
        let Some(img) = inner.select_first("img") else { continue };

        let mut attrs: Vec<_> = img.attrs().collect();
        attrs.sort_by_key(|(name, _)| *name);
        let mut markup = String::from("<img");
        for (name, value) in attrs {
            let value = resolve_image_attr(name, value, base);
            markup.push_str(&format!(r#" {name}="{}""#, html_escape::encode_double_quoted_attribute(&value)));
        }
        markup.push('>');
        edits.replace(noscript.id(), markup);
    }

    if edits.is_empty() {
        return Ok(content.to_string());
    }
    Ok(edits.render(&doc))
}

/// Maps canonical placeholder sources in the original container to the real
/// sources in their data attributes. Placeholders shared by several images
/// keep their real sources in document order.
pub fn placeholder_map(original: &Document, base: Option<&Url>) -> HashMap<String, VecDeque<String>> {
    let mut map: HashMap<String, VecDeque<String>> = HashMap::new();
    let Some(container) = article_container(original) else {
        return map;
    };
    for img in container.select("img").unwrap_or_default() {
        let src = img.attr("src").unwrap_or("");
        if !is_placeholder_url(src) {
            continue;
        }
        if let Some(real) = data_source(&img, base) {
            map.entry(normalize_image_url(src, base)).or_default().push_back(real);
        }
    }
    map
}

/// Swaps placeholder sources for recovered real ones, first through the
/// original page's map, then through the image's own data attributes.
pub fn repair_placeholders(content: &str, original: &Document, base: Option<&Url>) -> Result<String> {
    let mut map = placeholder_map(original, base);
    let doc = Document::parse_fragment(content);
    let mut edits = DomEdits::new();

    for img in doc.select("img")? {
        let src = img.attr("src").unwrap_or("");
        if !is_placeholder_url(src) {
            continue;
        }
        let recovered = map
            .get_mut(&normalize_image_url(src, base))
            .and_then(VecDeque::pop_front)
            .or_else(|| data_source(&img, base));
        match recovered {
            Some(real) => {
                let stale_srcset = img
                    .attr("srcset")
                    .is_some_and(|s| parse_srcset(s).iter().all(|e| is_placeholder_url(&e.url)));
                edits.set_attr(img.id(), "src", real);
                if stale_srcset {
                    edits.remove_attr(img.id(), "srcset");
                }
            }
            None => tracing::debug!(src, "placeholder image left unresolved"),
        }
    }

    if edits.is_empty() {
        return Ok(content.to_string());
    }
    Ok(edits.render(&doc))
}

/// Gives lazy iframes without a `src` their deferred source.
pub fn repair_iframes(content: &str) -> String {
    rewrite_html(
        content,
        vec![lol_html::element!("iframe[data-src], iframe[data-lazy-src]", |el| {
            let current = el.get_attribute("src").unwrap_or_default();
            if !current.trim().is_empty() && current != "about:blank" {
                return Ok(());
            }
            let deferred = el.get_attribute("data-src").or_else(|| el.get_attribute("data-lazy-src"));
            if let Some(deferred) = deferred.filter(|d| !d.trim().is_empty() && !is_data_uri(d)) {
                el.set_attribute("src", &deferred).ok();
            }
            Ok(())
        })],
    )
}
