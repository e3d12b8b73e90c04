use std::cmp::Ordering;
use std::collections::HashMap;

use ego_tree::NodeId;

use crate::dom_tree::outer_markup;
use crate::parse::{Document, Element};
use crate::postprocess::{PostProcessConfig, postprocess_html};
use crate::scoring::{ScoreConfig, calculate_score, link_density};
use crate::{GleanerError, Result};

/// Tags that may hold the main content.
const CANDIDATE_SELECTOR: &str = "div, article, section, main, p, td, pre, blockquote";

/// Ancestors that never receive propagated score.
const NO_PROPAGATION: &[&str] = &["html", "body", "head"];

/// Configuration for content extraction.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Minimum score for the top candidate.
    pub min_score_threshold: f64,
    /// Number of top candidates considered.
    pub max_top_candidates: usize,
    /// Character threshold; short blocks below a tenth of it are skipped.
    pub char_threshold: usize,
    /// Maximum elements to scan (0 = unlimited).
    pub max_elements: usize,
    /// Sibling score threshold as a fraction of the top score.
    pub sibling_threshold: f64,
    pub score: ScoreConfig,
    pub postprocess: PostProcessConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_score_threshold: 20.0,
            max_top_candidates: 5,
            char_threshold: 500,
            max_elements: 0,
            sibling_threshold: 0.2,
            score: ScoreConfig::default(),
            postprocess: PostProcessConfig::default(),
        }
    }
}

/// The result of content extraction.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Cleaned content fragment.
    pub content: String,
    pub top_score: f64,
    /// Top candidate plus joined siblings.
    pub element_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    element: Element<'a>,
    score: f64,
    /// Position in document order, the final tie-breaker.
    order: usize,
}

/// Scores every candidate element and adds propagated parent/grandparent
/// bonuses (score / 2 and score / 3).
fn score_candidates<'a>(doc: &'a Document, config: &ExtractConfig) -> Vec<Candidate<'a>> {
    let limit = if config.max_elements == 0 { usize::MAX } else { config.max_elements };
    let min_chars = config.char_threshold / 10;

    let mut own: HashMap<NodeId, (Element<'a>, f64)> = HashMap::new();
    let mut seeds: Vec<(NodeId, f64)> = Vec::new();

    for element in doc.select(CANDIDATE_SELECTOR).unwrap_or_default().into_iter().take(limit) {
        let structural = matches!(element.tag_name().as_str(), "article" | "section" | "main");
        if !structural && element.text_content().trim().chars().count() < min_chars {
            continue;
        }
        let score = calculate_score(&element, &config.score).final_score;
        own.insert(element.id(), (element, score));
        seeds.push((element.id(), score));
    }

    let mut bonus: HashMap<NodeId, f64> = HashMap::new();
    for (id, score) in &seeds {
        let Some((element, _)) = own.get(id).copied() else { continue };
        let ancestors: Vec<Element<'a>> = element
            .ancestors()
            .take_while(|a| !NO_PROPAGATION.contains(&a.tag_name().as_str()))
            .take(2)
            .collect();
        for (ancestor, divisor) in ancestors.into_iter().zip([2.0, 3.0]) {
            own.entry(ancestor.id())
                .or_insert_with(|| (ancestor, calculate_score(&ancestor, &config.score).final_score));
            *bonus.entry(ancestor.id()).or_default() += score / divisor;
        }
    }

    let order: HashMap<NodeId, usize> = doc
        .select("*")
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id(), i))
        .collect();

    own.into_iter()
        .map(|(id, (element, score))| Candidate {
            element,
            score: score + bonus.get(&id).copied().unwrap_or(0.0),
            order: order.get(&id).copied().unwrap_or(usize::MAX),
        })
        .collect()
}

fn candidate_priority(tag_name: &str) -> u8 {
    match tag_name {
        "article" | "main" | "section" => 3,
        "div" => 2,
        _ => 1,
    }
}

/// Best first: score, then structural tag, then text length, then document order.
fn compare_candidates(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| candidate_priority(&b.element.tag_name()).cmp(&candidate_priority(&a.element.tag_name())))
        .then_with(|| b.element.text_content().chars().count().cmp(&a.element.text_content().chars().count()))
        .then_with(|| a.order.cmp(&b.order))
}

/// Collects the top candidate and qualifying siblings in document order.
fn select_with_siblings<'a>(
    top: &Candidate<'a>, scored: &HashMap<NodeId, f64>, config: &ExtractConfig,
) -> Vec<Element<'a>> {
    let Some(parent) = top.element.parent_element() else {
        return vec![top.element];
    };
    let threshold = (top.score * config.sibling_threshold).max(10.0);

    parent
        .child_elements()
        .filter(|sibling| {
            if *sibling == top.element {
                return true;
            }
            if scored.get(&sibling.id()).is_some_and(|s| *s >= threshold) {
                return true;
            }
            if !sibling.is("p") {
                return false;
            }
            let text = sibling.text_content();
            let len = text.trim().chars().count();
            let density = link_density(sibling);
            (len > 80 && density < 0.25) || (len > 0 && density == 0.0 && text.trim_end().ends_with('.'))
        })
        .collect()
}

/// Finds the main content of a (preprocessed) page.
///
/// # Errors
///
/// Returns [`GleanerError::ReadabilityFailed`] when no candidate reaches the
/// minimum score.
pub fn extract_content(doc: &Document, config: &ExtractConfig) -> Result<ExtractedContent> {
    let mut candidates = score_candidates(doc, config);
    let scored: HashMap<NodeId, f64> = candidates.iter().map(|c| (c.element.id(), c.score)).collect();

    candidates.sort_by(compare_candidates);
    candidates.truncate(config.max_top_candidates.max(1));

    let top = candidates.first().ok_or(GleanerError::ReadabilityFailed)?;
    if top.score < config.min_score_threshold {
        tracing::debug!(score = top.score, threshold = config.min_score_threshold, "top candidate below threshold");
        return Err(GleanerError::ReadabilityFailed);
    }

    let selected = select_with_siblings(top, &scored, config);
    let markup = selected.iter().map(|e| outer_markup(*e)).collect::<Vec<_>>().join("\n");
    let content = postprocess_html(&markup, &config.postprocess);

    Ok(ExtractedContent { content, top_score: top.score, element_count: selected.len() })
}

/// Highest single-element score on the page, without propagation.
pub fn max_element_score(doc: &Document, config: &ScoreConfig) -> f64 {
    doc.select("p, div, article, section, main")
        .unwrap_or_default()
        .iter()
        .filter(|e| e.text_content().trim().chars().count() >= 25)
        .map(|e| calculate_score(e, config).final_score)
        .fold(0.0, f64::max)
}
