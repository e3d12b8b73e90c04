//! Selector-based extraction.
//!
//! An ordered list of include (`+`) and exclude (`-`) CSS rules is applied to
//! the raw page instead of Readability scoring.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::selectors::{Operation, SelectorItem, apply_selector_config};
//!
//! let rules = vec![
//!     SelectorItem::new("p", Operation::Include, 0),
//!     SelectorItem::new(".ad", Operation::Exclude, 1),
//! ];
//! let html = r#"<div><p>keep</p><p class="ad">drop</p></div>"#;
//! assert_eq!(apply_selector_config(html, &rules), "<p>keep</p>");
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::FeedSelectorConfig;
use crate::dom_tree::{DomEdits, inner_markup};
use crate::parse::{Document, Element, compile_selector};
use crate::{GleanerError, Result};

/// What a rule does with its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "+")]
    Include,
    #[serde(rename = "-")]
    Exclude,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Include => write!(f, "+"),
            Operation::Exclude => write!(f, "-"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = GleanerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" | "include" => Ok(Operation::Include),
            "-" | "exclude" => Ok(Operation::Exclude),
            other => Err(GleanerError::ConfigError(format!("unknown selector operation '{other}'"))),
        }
    }
}

/// One include/exclude rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorItem {
    pub id: String,
    pub selector: String,
    pub operation: Operation,
    /// Zero-based evaluation position, contiguous within a configuration.
    pub order: usize,
}

impl SelectorItem {
    /// Creates a rule with a fresh random id.
    pub fn new(selector: impl Into<String>, operation: Operation, order: usize) -> Self {
        Self { id: new_selector_id(), selector: selector.into(), operation, order }
    }
}

/// A random 16-hex-character rule id.
pub fn new_selector_id() -> String {
    format!("{:016x}", rand::thread_rng().r#gen::<u64>())
}

/// One accumulated element together with the exclusions applied to it.
struct Kept<'a> {
    element: Element<'a>,
    edits: DomEdits,
}

/// Applies the rules in `order` to `html` and returns the kept elements'
/// markup, concatenated.
///
/// Include rules append every match of the original document (overlapping
/// matches are kept twice). Exclude rules drop accumulated elements that
/// match and remove matching descendants from the rest. Invalid selectors
/// are logged and skipped.
pub fn apply_selector_config(html: &str, selectors: &[SelectorItem]) -> String {
    let doc = Document::parse(html);
    let mut rules: Vec<&SelectorItem> = selectors.iter().collect();
    rules.sort_by_key(|item| item.order);

    let mut kept: Vec<Kept<'_>> = Vec::new();
    for item in rules {
        let selector = match compile_selector(&item.selector) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!(selector = %item.selector, error = %e, "skipping invalid selector");
                continue;
            }
        };

        match item.operation {
            Operation::Include => {
                let matches = doc.html().select(&selector).filter_map(|el| doc.element(el.id()));
                kept.extend(matches.map(|element| Kept { element, edits: DomEdits::new() }));
            }
            Operation::Exclude => {
                kept.retain(|k| !k.element.matches(&selector));
                for entry in &mut kept {
                    for descendant in entry.element.select_with(&selector) {
                        entry.edits.remove(descendant.id());
                    }
                }
            }
        }
    }

    kept.iter().map(|k| k.edits.render_outer(k.element)).collect()
}

/// Content produced by selector mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorMode {
    /// Markup assembled from the rules.
    Fragment(String),
    /// The whole page body, for feeds that only restyle with custom CSS.
    Passthrough(String),
}

impl SelectorMode {
    pub fn into_html(self) -> String {
        match self {
            SelectorMode::Fragment(html) | SelectorMode::Passthrough(html) => html,
        }
    }
}

/// Picks the selector-mode content for a feed.
///
/// # Errors
///
/// [`GleanerError::NoSelectorConfig`] when the feed has neither rules nor
/// custom CSS.
pub fn resolve_selector_content(html: &str, config: &FeedSelectorConfig) -> Result<SelectorMode> {
    if !config.selectors.is_empty() {
        return Ok(SelectorMode::Fragment(apply_selector_config(html, &config.selectors)));
    }
    if config.custom_css.as_deref().is_some_and(|css| !css.trim().is_empty()) {
        let doc = Document::parse(html);
        return Ok(SelectorMode::Passthrough(inner_markup(doc.content_root())));
    }
    Err(GleanerError::NoSelectorConfig)
}
