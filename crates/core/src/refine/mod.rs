//! Image recovery and cleanup after a successful Readability extraction.
//!
//! The passes run over the extracted fragment with the original page as a
//! reference:
//!
//! 1. reinstate dropped article images ([`recover`])
//! 2. strip leftover page chrome ([`filter::strip_non_content`])
//! 3. turn `<noscript>` fallbacks and placeholder sources into real images ([`repair`])
//! 4. drop avatars, thumbnails and small images ([`filter::filter_images`])
//! 5. remove duplicate images and text blocks ([`dedup`])
//! 6. fix lazy iframes and prepend the title heading
//!
//! Every pass is an enhancement: [`refine_article`] keeps the unrefined
//! article when one fails.

pub mod dedup;
pub mod filter;
pub mod heuristics;
pub mod recover;
pub mod repair;

use url::Url;

use crate::Result;
use crate::article::ArticleContent;
use crate::dom_tree::DomEdits;
use crate::metadata::decode_entities;
use crate::parse::Document;

/// Runs every pass over `content` and returns the refined fragment.
///
/// # Errors
///
/// Propagates a failing pass; callers usually go through [`refine_article`].
pub fn refine_content(content: &str, original: &Document, title: &str, base: Option<&Url>) -> Result<String> {
    let mut html = recover::recover_images(content, original, base)?;
    html = filter::strip_non_content(&html)?;
    html = repair::repair_noscript(&html, base)?;
    html = repair::repair_placeholders(&html, original, base)?;
    html = filter::filter_images(&html, base)?;
    html = dedup::dedup_images(&html, base)?;
    html = dedup::dedup_text(&html)?;
    html = repair::repair_iframes(&html);
    Ok(prepend_title(&html, title))
}

/// Refines an extracted article against the prepared original page,
/// falling back to the article as extracted when refinement fails.
pub fn refine_article(article: ArticleContent, original_html: &str, base: Option<&Url>) -> ArticleContent {
    let original = Document::parse(original_html);
    match refine_content(&article.content, &original, &article.title, base) {
        Ok(content) => article.with_content(content),
        Err(e) => {
            tracing::warn!(error = %e, "image refinement failed, keeping extracted content");
            article
        }
    }
}

/// Prepends `<h1>title</h1>`, dropping any existing `<h1>` with the same text.
fn prepend_title(content: &str, title: &str) -> String {
    let title = decode_entities(title);
    let wanted = title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let doc = Document::parse_fragment(content);
    let mut edits = DomEdits::new();

    for h1 in doc.select("h1").unwrap_or_default() {
        let text = h1.text_content().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if text == wanted {
            edits.remove(h1.id());
        }
    }
    edits.prepend(doc.content_root().id(), format!("<h1>{}</h1>", html_escape::encode_text(&title)));
    edits.render(&doc)
}
