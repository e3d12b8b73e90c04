use std::sync::LazyLock;

use regex::Regex;

use crate::dom_tree::edit_fragment;
use crate::parse::Element;
use crate::preprocess::rewrite_html;
use crate::scoring::link_density;

static CONDITIONAL_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--\[if[^\]]*\]>.*?<!\[endif\]-->|<!--<!\[if[^\]]*\]>.*?<!\[endif\]-->"#).unwrap()
});

/// Selector for regions that count as the article's main content.
pub const MAIN_REGION: &str = "main, article, section, [role=main]";

/// Elements removed from extracted content wherever they appear.
const ALWAYS_REMOVED: &str = "nav, aside, form, button, input, select, textarea";

/// Elements removed unless they sit inside a main region.
const CHROME: &str = "header, footer";

/// Media that keeps an otherwise text-free element alive.
const MEDIA: &str = "img, picture, video, audio, iframe, embed, object, figure, svg, table, hr, br, noscript";

const EMPTY_CANDIDATES: &str = "div, p, span, section, article, header, footer, h2, h3, h4, h5, h6, li, ul, ol";

/// Configuration for fragment cleanup after extraction.
#[derive(Debug, Clone)]
pub struct PostProcessConfig {
    pub remove_conditional_comments: bool,
    /// Keep `class` attributes (default: false).
    pub keep_classes: bool,
    pub remove_chrome: bool,
    pub remove_empty_nodes: bool,
    pub remove_high_link_density: bool,
    /// Link density above which a block is dropped.
    pub max_link_density: f64,
    /// Blocks with at least this many characters survive the link density check.
    pub link_density_min_protected: usize,
    pub clean_nested_divs: bool,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            remove_conditional_comments: true,
            keep_classes: false,
            remove_chrome: true,
            remove_empty_nodes: true,
            remove_high_link_density: true,
            max_link_density: 0.5,
            link_density_min_protected: 500,
            clean_nested_divs: true,
        }
    }
}

/// Cleans an extracted content fragment.
pub fn postprocess_html(html: &str, config: &PostProcessConfig) -> String {
    let mut processed = html.to_string();

    if config.remove_conditional_comments {
        processed = CONDITIONAL_COMMENTS.replace_all(&processed, "").into_owned();
    }
    if !config.keep_classes {
        processed = strip_classes(&processed);
    }
    if config.remove_chrome {
        processed = remove_chrome(&processed);
    }
    if config.remove_high_link_density {
        processed = remove_high_link_density_nodes(&processed, config);
    }
    if config.remove_empty_nodes {
        processed = remove_empty_nodes(&processed);
    }
    if config.clean_nested_divs {
        processed = clean_nested_divs(&processed);
    }

    processed.trim().to_string()
}

fn strip_classes(html: &str) -> String {
    rewrite_html(
        html,
        vec![lol_html::element!("[class]", |el| {
            el.remove_attribute("class");
            Ok(())
        })],
    )
}

/// Whether the element sits inside (or is) a recognized main region.
pub fn in_main_region(element: &Element<'_>) -> bool {
    let is_main = |e: &Element<'_>| {
        matches!(e.tag_name().as_str(), "main" | "article" | "section") || e.attr("role") == Some("main")
    };
    is_main(element) || element.ancestors().any(|a| is_main(&a))
}

/// Drops navigation, asides and forms, and headers/footers outside main regions.
pub fn remove_chrome(html: &str) -> String {
    edit_fragment(html, |doc, edits| {
        for el in doc.select(ALWAYS_REMOVED).unwrap_or_default() {
            edits.remove(el.id());
        }
        for el in doc.select(CHROME).unwrap_or_default() {
            if !in_main_region(&el) {
                edits.remove(el.id());
            }
        }
    })
}

fn remove_high_link_density_nodes(html: &str, config: &PostProcessConfig) -> String {
    edit_fragment(html, |doc, edits| {
        for el in doc.select("div, section, ul, ol, li, p, table").unwrap_or_default() {
            let len = el.text_content().trim().chars().count();
            if len == 0 || len >= config.link_density_min_protected {
                continue;
            }
            if link_density(&el) > config.max_link_density {
                edits.remove(el.id());
            }
        }
    })
}

fn has_media(element: &Element<'_>) -> bool {
    element.select(MEDIA).map(|found| !found.is_empty()).unwrap_or(false)
}

/// Drops blocks with no text and no media.
fn remove_empty_nodes(html: &str) -> String {
    edit_fragment(html, |doc, edits| {
        for el in doc.select(EMPTY_CANDIDATES).unwrap_or_default() {
            if el.text_content().trim().is_empty() && !has_media(&el) {
                edits.remove(el.id());
            }
        }
    })
}

/// Unwraps attribute-free `<div>`s whose only child is another `<div>`.
fn clean_nested_divs(html: &str) -> String {
    edit_fragment(html, |doc, edits| {
        for div in doc.select("div").unwrap_or_default() {
            if div.attrs().next().is_some() {
                continue;
            }
            let mut children = div
                .node()
                .children()
                .filter(|c| c.value().as_text().is_none_or(|t| !t.trim().is_empty()));
            let only_div = children
                .next()
                .and_then(|c| c.value().as_element().map(|e| e.name() == "div"))
                .unwrap_or(false);
            if only_div && children.next().is_none() {
                edits.unwrap(div.id());
            }
        }
    })
}
