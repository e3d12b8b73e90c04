//! Reinstates images from the original page that the scoring pass dropped.

use std::collections::{HashMap, HashSet};

use ego_tree::NodeId;
use url::Url;

use super::heuristics::{
    MAIN_IMAGE_ATTR, MAIN_IMAGE_WIDTH, MIN_IMAGE_WIDTH, image_urls, in_aside, in_gallery, is_avatar, is_gallery_element,
    is_main_image, resolve_src, resolve_width,
};
use crate::Result;
use crate::dom_tree::edit_fragment;
use crate::parse::{Document, Element};
use crate::urls::normalize_image_url;

/// Article containers in the original page, most specific first.
const CONTAINER_SELECTORS: &[&str] = &[
    "[itemprop=articleBody]",
    ".article-body",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".story-body",
    "article",
    "main",
    "[role=main]",
];

const MAX_CANDIDATES: usize = 100;
const PRECEDING_SIBLINGS: usize = 5;
const FOLLOWING_SIBLINGS: usize = 2;

/// An original image that survived the recovery checks.
#[derive(Debug, Clone)]
pub struct RecoveredImage {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub gallery: bool,
    pub main: bool,
}

impl RecoveredImage {
    /// `<figure>` markup with an alt-derived caption.
    pub fn to_figure(&self) -> String {
        let mut img = format!(r#"<img src="{}""#, html_escape::encode_double_quoted_attribute(&self.src));
        if let Some(alt) = &self.alt {
            img.push_str(&format!(r#" alt="{}""#, html_escape::encode_double_quoted_attribute(alt)));
        }
        if let Some(width) = self.width {
            img.push_str(&format!(r#" width="{width}""#));
        }
        if self.main {
            img.push_str(&format!(r#" {MAIN_IMAGE_ATTR}="true""#));
        }
        img.push('>');

        match self.alt.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            Some(alt) => format!("<figure>{img}<figcaption>{}</figcaption></figure>", html_escape::encode_text(alt)),
            None => format!("<figure>{img}</figure>"),
        }
    }
}

fn is_chrome_div(div: &Element<'_>) -> bool {
    let marker = format!("{} {}", div.class_name(), div.attr("id").unwrap_or("")).to_lowercase();
    ["nav", "menu", "sidebar", "footer", "header", "comment"].iter().any(|m| marker.contains(m))
        || div.ancestors().any(|a| a.is("nav") || a.is("aside"))
}

/// The original page's best-guess article container: the first known
/// container selector, else the largest non-navigation `<div>`, else `<body>`.
pub fn article_container(doc: &Document) -> Option<Element<'_>> {
    if let Some(found) = CONTAINER_SELECTORS.iter().find_map(|s| doc.select_first(s)) {
        return Some(found);
    }
    doc.select("div")
        .unwrap_or_default()
        .into_iter()
        .filter(|div| !is_chrome_div(div))
        .max_by_key(|div| div.text_content().trim().chars().count())
        .or_else(|| doc.body())
}

/// Candidate originals: the container's images, those of nearby sibling
/// containers, and those of galleries placed before the container.
fn candidate_images<'a>(doc: &'a Document, container: Element<'a>) -> Vec<(Element<'a>, Option<usize>)> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    let mut out = Vec::new();
    let mut push = |img: Element<'a>, position: Option<usize>, out: &mut Vec<(Element<'a>, Option<usize>)>| {
        if out.len() < MAX_CANDIDATES && seen.insert(img.id()) {
            out.push((img, position));
        }
    };

    for (i, img) in container.select("img").unwrap_or_default().into_iter().enumerate() {
        push(img, Some(i), &mut out);
    }

    let preceding = container.node().prev_siblings().filter_map(|n| doc.element(n.id())).take(PRECEDING_SIBLINGS);
    let following = container.node().next_siblings().filter_map(|n| doc.element(n.id())).take(FOLLOWING_SIBLINGS);
    for sibling in preceding.chain(following) {
        for img in sibling.select("img").unwrap_or_default() {
            push(img, None, &mut out);
        }
    }

    let order: HashMap<NodeId, usize> =
        doc.select("*").unwrap_or_default().iter().enumerate().map(|(i, e)| (e.id(), i)).collect();
    let container_pos = order.get(&container.id()).copied().unwrap_or(usize::MAX);
    for gallery in doc.select("div, section, ul, figure").unwrap_or_default() {
        let before = order.get(&gallery.id()).is_some_and(|p| *p < container_pos);
        if before && is_gallery_element(&gallery) && !gallery.contains(&container) {
            for img in gallery.select("img").unwrap_or_default() {
                push(img, None, &mut out);
            }
        }
    }
    out
}

/// Canonical keys of every image URL already shown by the fragment.
pub fn fragment_image_keys(fragment: &Document, base: Option<&Url>) -> HashSet<String> {
    fragment
        .select("img")
        .unwrap_or_default()
        .iter()
        .flat_map(|img| image_urls(img, base))
        .map(|u| normalize_image_url(&u, base))
        .collect()
}

/// Selects the original images worth reinstating, gallery members first,
/// then widest first.
pub fn recoverable_images(original: &Document, fragment: &Document, base: Option<&Url>) -> Vec<RecoveredImage> {
    let Some(container) = article_container(original) else {
        return Vec::new();
    };
    let mut present = fragment_image_keys(fragment, base);
    let mut recovered = Vec::new();

    for (img, position) in candidate_images(original, container) {
        if in_aside(&img) || is_avatar(&img) {
            continue;
        }
        let Some(src) = resolve_src(&img, base) else {
            tracing::debug!("skipping image without a usable source");
            continue;
        };
        let mut keys: Vec<String> = image_urls(&img, base).iter().map(|u| normalize_image_url(u, base)).collect();
        keys.push(normalize_image_url(&src, base));
        if keys.iter().any(|k| present.contains(k)) {
            continue;
        }

        let width = resolve_width(&img, Some(&src));
        let main = is_main_image(&img, position);
        match width {
            Some(w) if w < MIN_IMAGE_WIDTH => continue,
            Some(w) if w >= MAIN_IMAGE_WIDTH => {}
            _ if !main => continue,
            _ => {}
        }

        present.extend(keys);
        recovered.push(RecoveredImage {
            src,
            alt: img.attr("alt").map(str::trim).filter(|a| !a.is_empty()).map(String::from),
            width,
            gallery: in_gallery(&img),
            main,
        });
    }

    recovered.sort_by(|a, b| b.gallery.cmp(&a.gallery).then_with(|| b.width.unwrap_or(0).cmp(&a.width.unwrap_or(0))));
    recovered
}

/// Inserts recovered images after the fragment's first `<h1>`, or at its start.
pub fn recover_images(content: &str, original: &Document, base: Option<&Url>) -> Result<String> {
    let fragment = Document::parse_fragment(content);
    let recovered = recoverable_images(original, &fragment, base);
    if recovered.is_empty() {
        return Ok(content.to_string());
    }
    tracing::debug!(count = recovered.len(), "reinstating images");

    let markup: String = recovered.iter().map(RecoveredImage::to_figure).collect();
    Ok(edit_fragment(content, |doc, edits| match doc.select_first("h1") {
        Some(h1) => edits.insert_after(h1.id(), markup),
        None => edits.prepend(doc.content_root().id(), markup),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_container_priority() {
        let doc = Document::parse(
            r#"<html><body><article><div class="entry-content"><p>x</p></div></article></body></html>"#,
        );
        assert!(article_container(&doc).unwrap().has_class("entry-content"));

        let doc = Document::parse(
            r#"<html><body><div class="menu">a b c d e f g h</div><div id="story"><p>longer story text here</p></div></body></html>"#,
        );
        assert_eq!(article_container(&doc).unwrap().attr("id"), Some("story"));
    }

    #[test]
    fn test_recovers_dropped_wide_image() {
        let original = Document::parse(
            r#"<html><body><article>
                <img class="author-avatar" src="https://example.com/ada.jpg" width="900">
                <img src="https://example.com/thumb.jpg" width="120">
                <img src="https://example.com/blank.gif" data-src="https://example.com/harbour.jpg" width="1200" alt="Harbour at dawn">
                <img src="https://example.com/kept.jpg" width="1200">
            </article></body></html>"#,
        );
        let content = r#"<h1>Title</h1><p>Body</p><img src="https://example.com/kept.jpg?w=600">"#;

        let result = recover_images(content, &original, None).unwrap();
        let doc = Document::parse_fragment(&result);
        let srcs: Vec<_> = doc.select("img").unwrap().iter().filter_map(|i| i.attr("src")).map(String::from).collect();

        assert_eq!(srcs, vec!["https://example.com/harbour.jpg", "https://example.com/kept.jpg?w=600"]);
        assert!(result.starts_with("<h1>Title</h1><figure>"));
        assert!(result.contains("<figcaption>Harbour at dawn</figcaption>"));
    }

    #[test]
    fn test_mid_width_needs_main_image() {
        let filler = r#"<img src="https://example.com/f1.jpg" width="1000"><img src="https://example.com/f2.jpg" width="1000"><img src="https://example.com/f3.jpg" width="1000">"#;
        let original = Document::parse(&format!(
            r#"<html><body><article>{filler}<img src="https://example.com/mid.jpg" width="600"></article></body></html>"#
        ));
        let recovered = recoverable_images(&original, &Document::parse_fragment("<p>x</p>"), None);
        assert!(recovered.iter().all(|r| !r.src.ends_with("mid.jpg")));
        assert_eq!(recovered.len(), 3);
    }

    #[test]
    fn test_gallery_before_container_sorted_first() {
        let original = Document::parse(
            r#"<html><body>
                <div class="gallery"><img src="https://example.com/g1.jpg" width="900"></div>
                <article><img src="https://example.com/wide.jpg" width="2000"></article>
            </body></html>"#,
        );
        let recovered = recoverable_images(&original, &Document::parse_fragment("<p>x</p>"), None);
        let srcs: Vec<_> = recovered.iter().map(|r| r.src.as_str()).collect();
        assert_eq!(srcs, vec!["https://example.com/g1.jpg", "https://example.com/wide.jpg"]);
    }
}
