//! Removes page chrome and images that do not belong to the article.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::Node;
use url::Url;

use super::heuristics::{
    MAIN_IMAGE_ATTR, MAIN_IMAGE_WIDTH, MIN_IMAGE_WIDTH, in_article_content, in_gallery, is_avatar, is_main_image,
    is_tracking_pixel, resolve_src, resolve_width,
};
use crate::Result;
use crate::dom_tree::DomEdits;
use crate::parse::{Document, Element};
use crate::postprocess::{MAIN_REGION, in_main_region};

/// Ad and widget blocks dropped outside the main region.
const AD_WIDGETS: &str = ".ad, .ads, .advert, .advertisement, [class*=ad-slot], [class*=ad-container], [id^=ad-], \
                          [class*=widget], [class*=promo], [class*=newsletter], [class*=social-share], [data-ad], [data-widget]";

/// Runs of at least this many images read as a related-articles strip.
const RELATED_RUN: usize = 3;

/// Removes `header`, `nav`, `footer` and ad blocks from fragments that have
/// no main region. Fragments already wrapped in `main`, `article`, `section`
/// or `[role=main]` are returned as they are.
pub fn strip_non_content(content: &str) -> Result<String> {
    let doc = Document::parse_fragment(content);
    if !doc.select(MAIN_REGION)?.is_empty() {
        return Ok(content.to_string());
    }
    let mut targets = doc.select("header, nav, footer")?;
    targets.extend(doc.select(AD_WIDGETS)?);

    let mut edits = DomEdits::new();
    for el in targets {
        edits.remove(el.id());
    }
    if edits.is_empty() {
        return Ok(content.to_string());
    }
    Ok(edits.render(&doc))
}

/// Where an image sits among the fragment's images and text.
#[derive(Debug, Clone, Copy)]
struct ImagePlacement {
    /// Zero-based index among the fragment's images.
    position: usize,
    /// Share of the fragment's text that precedes the image.
    text_before: f64,
    /// Images after this one.
    images_after: usize,
}

fn image_placements(doc: &Document) -> HashMap<NodeId, ImagePlacement> {
    let root = doc.content_root();
    let mut chars = 0usize;
    let mut seen: Vec<(NodeId, usize)> = Vec::new();
    for node in root.node().descendants() {
        match node.value() {
            Node::Text(text) => chars += text.trim().chars().count(),
            Node::Element(el) if el.name() == "img" => seen.push((node.id(), chars)),
            _ => {}
        }
    }

    let total = seen.len();
    seen.into_iter()
        .enumerate()
        .map(|(i, (id, before))| {
            let text_before = if chars == 0 { 0.0 } else { before as f64 / chars as f64 };
            (id, ImagePlacement { position: i, text_before, images_after: total - i - 1 })
        })
        .collect()
}

/// The block an image occupies: its `<figure>` or `<picture>`, else the image.
pub fn image_block<'a>(img: &Element<'a>) -> Element<'a> {
    if let Some(figure) = img.closest("figure")
        && figure.select("img").map(|imgs| imgs.len() == 1).unwrap_or(false)
    {
        return figure;
    }
    match img.parent_element() {
        Some(parent) if parent.is("picture") => parent,
        _ => *img,
    }
}

fn image_count(element: &Element<'_>) -> usize {
    element.select("img").map(|imgs| imgs.len()).unwrap_or(0)
}

fn is_image_only(element: &Element<'_>) -> bool {
    (element.is("img") || image_count(element) > 0) && element.text_content().trim().chars().count() < 80
}

/// Related-article thumbnails: list/grid members, runs of adjacent images,
/// trailing image clusters and uniform-width card grids.
fn is_related_thumbnail(img: &Element<'_>, placement: &ImagePlacement) -> bool {
    let in_list = img.ancestors().take(4).any(|a| {
        let marker = a.class_name().to_lowercase();
        (a.is("ul") || a.is("ol") || marker.contains("grid") || marker.contains("list")) && image_count(&a) >= RELATED_RUN
    });
    if in_list {
        return true;
    }

    let unit = layout_unit(img);
    let mut run = 1;
    let mut cursor = unit.prev_element_sibling();
    while let Some(prev) = cursor.filter(is_image_only) {
        run += 1;
        cursor = prev.prev_element_sibling();
    }
    let mut cursor = unit.next_element_sibling();
    while let Some(next) = cursor.filter(is_image_only) {
        run += 1;
        cursor = next.next_element_sibling();
    }
    if run >= RELATED_RUN {
        return true;
    }

    if placement.text_before >= 0.8 && placement.images_after >= RELATED_RUN {
        return true;
    }

    uniform_wide_cluster(&unit)
}

/// The image's block widened through single-child wrappers, stopping below
/// the fragment root.
fn layout_unit<'a>(img: &Element<'a>) -> Element<'a> {
    let mut unit = image_block(img);
    while let Some(parent) = unit.parent_element()
        && parent.parent_element().is_some()
        && parent.child_elements().count() == 1
    {
        unit = parent;
    }
    unit
}

/// Whether a card wrapper around the unit (below the fragment root, mostly
/// images) holds three or more images of one identical width between 1000
/// and 1500 pixels.
fn uniform_wide_cluster(unit: &Element<'_>) -> bool {
    let wrapper = unit
        .ancestors()
        .take_while(|a| a.parent_element().is_some())
        .take(3)
        .find(|a| image_count(a) >= RELATED_RUN);
    let Some(wrapper) = wrapper.filter(|w| {
        w.text_content().trim().chars().count() < 80 * image_count(w) && !in_main_region(w)
    }) else {
        return false;
    };
    let widths: Vec<Option<u32>> = wrapper
        .select("img")
        .unwrap_or_default()
        .iter()
        .map(|img| resolve_width(img, img.attr("src")))
        .collect();
    let Some(Some(first)) = widths.first().copied() else {
        return false;
    };
    widths.iter().all(|w| *w == Some(first)) && (1000..=1500).contains(&first)
}

/// Why an image is dropped, if it is.
fn rejection(img: &Element<'_>, placement: &ImagePlacement, base: Option<&Url>) -> Option<&'static str> {
    if is_avatar(img) {
        return Some("avatar");
    }
    if !in_article_content(img) {
        return Some("outside article content");
    }
    let Some(src) = resolve_src(img, base) else {
        return Some("no usable source");
    };
    if is_tracking_pixel(img, &src) {
        return Some("tracking pixel");
    }
    let gallery = in_gallery(img);
    if !gallery && img.attr(MAIN_IMAGE_ATTR) != Some("true") && is_related_thumbnail(img, placement) {
        return Some("related thumbnail");
    }

    let width = resolve_width(img, Some(&src));
    match width {
        Some(w) if w < MIN_IMAGE_WIDTH => Some("narrow"),
        Some(w) if w < MAIN_IMAGE_WIDTH && !is_main_image(img, Some(placement.position)) => Some("mid-width, not main"),
        _ => None,
    }
}

/// Drops avatars, chrome images, sourceless images and tracking pixels,
/// related thumbnails and small images, together with their `<figure>`
/// wrappers.
pub fn filter_images(content: &str, base: Option<&Url>) -> Result<String> {
    let doc = Document::parse_fragment(content);
    let placements = image_placements(&doc);
    let mut edits = DomEdits::new();

    for img in doc.select("img")? {
        let Some(placement) = placements.get(&img.id()) else { continue };
        if let Some(reason) = rejection(&img, placement, base) {
            tracing::debug!(src = img.attr("src").unwrap_or(""), reason, "dropping image");
            edits.remove(image_block(&img).id());
        }
    }

    if edits.is_empty() {
        return Ok(content.to_string());
    }
    Ok(edits.render(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROSE: &str = "<p>Long enough paragraph of article prose that carries most of the readable text.</p>";

    #[test]
    fn test_strip_non_content_without_main() {
        let html = r#"<header>Site</header><nav>Menu</nav><div class="ad">Buy</div><p>Story</p><footer>Foot</footer>"#;
        assert_eq!(strip_non_content(html).unwrap(), "<p>Story</p>");
    }

    #[test]
    fn test_strip_non_content_leaves_wrapped_fragment() {
        let html = r#"<header>Site</header><article><header>Byline block</header><p>Story</p></article><div class="ad">Buy</div>"#;
        assert_eq!(strip_non_content(html).unwrap(), html);
    }

    #[test]
    fn test_tracking_pixel_removed() {
        let html = format!(r#"{PROSE}<img src="https://t.example.com/pixel.gif" width="1" height="1">{PROSE}"#);
        let result = filter_images(&html, None).unwrap();
        assert!(!result.contains("<img"));
    }

    #[test]
    fn test_small_image_removed_with_figure() {
        let html = format!(
            r#"{PROSE}<figure><img src="https://example.com/small.jpg" width="200"><figcaption>Tiny</figcaption></figure>{PROSE}"#
        );
        let result = filter_images(&html, None).unwrap();
        assert!(!result.contains("<figure>"));
        assert!(!result.contains("Tiny"));
    }

    #[test]
    fn test_mid_width_kept_when_main() {
        let html = format!(r#"<img src="https://example.com/lead.jpg" width="600">{PROSE}"#);
        assert!(filter_images(&html, None).unwrap().contains("lead.jpg"));
    }

    #[test]
    fn test_related_strip_removed() {
        let cards = (1..=4)
            .map(|i| format!(r#"<div><img src="https://example.com/card{i}.jpg" width="1200"></div>"#))
            .collect::<String>();
        let html = format!(r#"<img src="https://example.com/lead.jpg" width="1200">{PROSE}{PROSE}{cards}"#);
        let result = filter_images(&html, None).unwrap();
        assert!(result.contains("lead.jpg"));
        assert!(!result.contains("card1.jpg"));
        assert!(!result.contains("card4.jpg"));
    }

    #[test]
    fn test_real_image_with_placeholder_word_kept() {
        let html = format!(r#"{PROSE}<img src="https://cdn.example.com/uploads/default/harbour.jpg" width="1200">{PROSE}"#);
        assert!(filter_images(&html, None).unwrap().contains("uploads/default/harbour.jpg"));
    }

    #[test]
    fn test_srcset_only_image_kept() {
        let html = format!(r#"{PROSE}<img srcset="https://cdn.example.com/boat-1600.jpg 1600w" alt="Boat">{PROSE}"#);
        assert!(filter_images(&html, None).unwrap().contains("boat-1600.jpg"));
    }

    #[test]
    fn test_sourceless_image_removed() {
        let html = format!(r#"{PROSE}<img src="data:image/gif;base64,R0lGOD" alt="Pending">{PROSE}"#);
        assert!(!filter_images(&html, None).unwrap().contains("<img"));
    }

    #[test]
    fn test_avatar_removed() {
        let html = format!(r#"<div class="author-box"><img src="https://example.com/me.jpg" width="900"></div>{PROSE}"#);
        assert!(!filter_images(&html, None).unwrap().contains("me.jpg"));
    }
}
