//! Duplicate image and text removal.
//!
//! Both passes are idempotent: after one run no two kept nodes compare
//! equal, so a second run records no edits.

use url::Url;

use super::filter::image_block;
use super::heuristics::{MAIN_IMAGE_ATTR, is_hidden, resolve_src, resolve_width, signature};
use crate::Result;
use crate::dom_tree::DomEdits;
use crate::parse::{Document, Element};
use crate::urls::normalize_image_url;

/// Minimum characters for a text block to take part in text dedup.
const MIN_DUPLICATE_TEXT: usize = 50;

struct ImageKey<'a> {
    element: Element<'a>,
    url: Option<String>,
    signature: Option<String>,
}

/// Whether `challenger` should replace `incumbent` when both share a signature:
/// main image first, then the visible one, then the wider one.
fn prefer(challenger: &Element<'_>, incumbent: &Element<'_>) -> bool {
    let main = |e: &Element<'_>| e.attr(MAIN_IMAGE_ATTR) == Some("true");
    if main(challenger) != main(incumbent) {
        return main(challenger);
    }
    if is_hidden(challenger) != is_hidden(incumbent) {
        return !is_hidden(challenger);
    }
    let width = |e: &Element<'_>| resolve_width(e, resolve_src(e, None).as_deref()).unwrap_or(0);
    width(challenger) > width(incumbent)
}

/// Removes images whose canonical URL or signature repeats an earlier one.
pub fn dedup_images(content: &str, base: Option<&Url>) -> Result<String> {
    let doc = Document::parse_fragment(content);
    let mut kept: Vec<ImageKey<'_>> = Vec::new();
    let mut losers: Vec<Element<'_>> = Vec::new();

    for img in doc.select("img")? {
        let key = ImageKey {
            element: img,
            url: resolve_src(&img, base).map(|src| normalize_image_url(&src, base)),
            signature: signature(&img),
        };

        if key.url.is_some() && kept.iter().any(|k| k.url == key.url) {
            losers.push(img);
            continue;
        }
        if let Some(sig) = key.signature.clone()
            && let Some(slot) = kept.iter_mut().find(|k| k.signature.as_ref() == Some(&sig))
        {
            if prefer(&img, &slot.element) {
                losers.push(std::mem::replace(slot, key).element);
            } else {
                losers.push(img);
            }
            continue;
        }
        kept.push(key);
    }

    if losers.is_empty() {
        return Ok(content.to_string());
    }
    tracing::debug!(count = losers.len(), "removing duplicate images");
    let mut edits = DomEdits::new();
    for loser in losers {
        edits.remove(image_block(&loser).id());
    }
    Ok(edits.render(&doc))
}

fn normalized_text(element: &Element<'_>) -> String {
    element.text_content().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Same tag with identical classes, or any shared class token.
fn same_shape(a: &Element<'_>, b: &Element<'_>) -> bool {
    if a.tag_name() != b.tag_name() {
        return false;
    }
    let (mut ca, mut cb) = (a.classes(), b.classes());
    ca.sort_unstable();
    cb.sort_unstable();
    ca == cb || ca.iter().any(|c| cb.contains(c))
}

fn is_heading_block(element: &Element<'_>) -> bool {
    let mut children = element.child_elements();
    matches!(children.next(), Some(first) if matches!(first.tag_name().as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
        && children.next().is_none()
}

/// Removes later text blocks repeating an earlier block's text and shape.
pub fn dedup_text(content: &str) -> Result<String> {
    let doc = Document::parse_fragment(content);
    let blocks = doc.select("p, div, section, article > div, article > p")?;

    let mut edits = DomEdits::new();
    let mut kept: Vec<(Element<'_>, String)> = Vec::new();
    for block in blocks {
        if edits.is_detached(&block) || block.closest("figure").is_some() || is_heading_block(&block) {
            continue;
        }
        let text = normalized_text(&block);
        if text.chars().count() < MIN_DUPLICATE_TEXT {
            continue;
        }
        let duplicate = kept.iter().any(|(earlier, earlier_text)| {
            *earlier_text == text && same_shape(earlier, &block) && !earlier.contains(&block) && !block.contains(earlier)
        });
        if duplicate {
            edits.remove(block.id());
        } else {
            kept.push((block, text));
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

    #[test]
    fn test_dedup_images_by_url() {
        let html = r#"<img src="https://cdn.example.com/600x400/boat.jpg"><p>Text</p><figure><img src="https://cdn.example.com/boat.jpg?w=1200"></figure>"#;
        let result = dedup_images(html, None).unwrap();
        assert_eq!(result, r#"<img src="https://cdn.example.com/600x400/boat.jpg"><p>Text</p>"#);
    }

    #[test]
    fn test_dedup_images_by_signature_prefers_main() {
        let html = r#"<img src="https://example.com/a.jpg" alt="Boats leaving the harbour" width="900"><img src="https://example.com/b.jpg" alt="Boats leaving the harbour" data-main-image="true">"#;
        let result = dedup_images(html, None).unwrap();
        assert!(!result.contains("a.jpg"));
        assert!(result.contains("b.jpg"));
    }

    #[test]
    fn test_dedup_images_by_signature_prefers_visible_then_wider() {
        let html = r#"<img class="responsive" src="https://example.com/a.jpg" alt="Boats leaving the harbour" width="2000"><img src="https://example.com/b.jpg" alt="Boats leaving the harbour" width="800"><img src="https://example.com/c.jpg" alt="Boats leaving the harbour" width="1600">"#;
        let result = dedup_images(html, None).unwrap();
        assert!(!result.contains("a.jpg"));
        assert!(!result.contains("b.jpg"));
        assert!(result.contains("c.jpg"));
    }

    #[test]
    fn test_dedup_images_idempotent() {
        let html = r#"<figure><img src="https://example.com/x-300x200.jpg" alt="A caption long enough"></figure><img src="https://example.com/x.jpg"><img src="https://example.com/y.jpg" alt="A caption long enough" width="1200"><img src="https://example.com/z.jpg">"#;
        let once = dedup_images(html, None).unwrap();
        let twice = dedup_images(&once, None).unwrap();
        assert_eq!(once, twice);
        assert!(once.contains("z.jpg"));
    }

    #[test]
    fn test_dedup_text() {
        let para = "<p>This paragraph is repeated by a sloppy template, word for word, twice.</p>";
        let html = format!("{para}<div><p>Other text</p></div>{para}");
        let result = dedup_text(&html).unwrap();
        assert_eq!(result.matches("sloppy template").count(), 1);
        assert!(result.contains("Other text"));
    }

    #[test]
    fn test_dedup_text_keeps_nested_and_short() {
        let html = "<div><div><p>Nested wrappers repeat their child's text exactly as it reads.</p></div></div><p>tiny</p><p>tiny</p>";
        assert_eq!(dedup_text(html).unwrap(), html);
    }

    #[test]
    fn test_dedup_text_idempotent() {
        let para = r#"<p class="lead">A paragraph with plenty of words to cross the length bar.</p>"#;
        let html = format!(r#"{para}<p class="lead extra">A paragraph with plenty of words to cross the length bar.</p>{para}"#);
        let once = dedup_text(&html).unwrap();
        assert_eq!(once, dedup_text(&once).unwrap());
        assert_eq!(once.matches("plenty of words").count(), 1);
    }
}
