//! Content scoring for candidate containers.
//!
//! Every candidate gets a base score from its tag, a class/id weight, a
//! density score from its text, and a link-density penalty.

use std::sync::LazyLock;

use regex::Regex;

use crate::parse::Element;

/// Class/id fragments that suggest main content.
static POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story)").unwrap()
});

/// Class/id fragments that suggest boilerplate.
static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|share|shoutbox|sidebar|sponsor|ad-break|agegate|pagination|pager|popup|promo|recirculation|newsletter)",
    )
    .unwrap()
});

/// Tuning for [`calculate_score`].
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Weight added for a positive class/id match.
    pub positive_weight: f64,
    /// Weight added for a negative class/id match.
    pub negative_weight: f64,
    /// Cap on the character density contribution.
    pub max_char_density_score: f64,
    /// Cap on the comma density contribution.
    pub max_comma_density_score: f64,
    /// Characters per density point.
    pub chars_per_point: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            positive_weight: 25.0,
            negative_weight: -25.0,
            max_char_density_score: 3.0,
            max_comma_density_score: 3.0,
            chars_per_point: 100,
        }
    }
}

/// Breakdown of an element's score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub base_score: f64,
    pub class_weight: f64,
    pub content_density: f64,
    /// Link density, from 0.0 to 1.0.
    pub link_density: f64,
    pub final_score: f64,
}

/// Base score for an element from its tag name.
pub fn base_tag_score(element: &Element<'_>) -> f64 {
    match element.tag_name().as_str() {
        "article" => 10.0,
        "section" | "main" => 8.0,
        "div" => 5.0,
        "td" | "blockquote" => 3.0,
        "pre" | "p" => 0.0,
        "form" | "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" | "header" | "footer" | "nav" | "aside" => -5.0,
        _ => 0.0,
    }
}

/// Weight adjustment from class and id patterns.
///
/// The class list and the id each contribute once: the negative weight when
/// any token reads as boilerplate, else the positive weight when any token
/// suggests content. The two contributions are summed.
pub fn class_id_weight(element: &Element<'_>, config: &ScoreConfig) -> f64 {
    let classes = element.classes();
    let id: Vec<&str> = element.attr("id").into_iter().collect();
    [classes.as_slice(), id.as_slice()].iter().map(|tokens| token_weight(tokens, config)).sum()
}

fn token_weight(tokens: &[&str], config: &ScoreConfig) -> f64 {
    if tokens.iter().any(|t| is_negative_token(t)) {
        config.negative_weight
    } else if tokens.iter().any(|t| POSITIVE.is_match(t)) {
        config.positive_weight
    } else {
        0.0
    }
}

/// Whether a class or id token reads as boilerplate. Boilerplate words win
/// over content words in the same token (`related-posts`, `post-comments`).
pub fn is_negative_token(token: &str) -> bool {
    NEGATIVE.is_match(token)
}

/// Density score from text length and comma count.
pub fn content_density_score(element: &Element<'_>, config: &ScoreConfig) -> f64 {
    density_of(&element.text_content(), config)
}

fn density_of(text: &str, config: &ScoreConfig) -> f64 {
    let char_score = ((text.chars().count() / config.chars_per_point) as f64).min(config.max_char_density_score);
    let comma_score = (text.matches(',').count() as f64).min(config.max_comma_density_score);
    char_score + comma_score
}

/// Ratio of anchor text to all text, from 0.0 to 1.0.
pub fn link_density(element: &Element<'_>) -> f64 {
    let text_length = element.text_content().chars().count();
    if text_length == 0 {
        return 0.0;
    }

    let link_length: usize = element
        .select("a")
        .unwrap_or_default()
        .iter()
        .map(|link| link.text_content().chars().count())
        .sum();

    (link_length as f64 / text_length as f64).min(1.0)
}

/// Detects `<pre>` blocks that hold code rather than prose.
fn looks_like_code(tag: &str, text: &str) -> bool {
    if tag != "pre" || text.len() <= 50 {
        return false;
    }
    let len = text.len() as f64;
    let commas = text.matches(',').count() as f64 / len;
    let spaces = text.matches(' ').count() as f64 / len;
    let special = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count() as f64 / len;
    special > 0.15 && commas < 0.01 && spaces < 0.15
}

/// Final score of an element.
///
/// Link density halves its penalty for elements with a positive class/id or
/// more than 500 characters of text.
pub fn calculate_score(element: &Element<'_>, config: &ScoreConfig) -> ScoreResult {
    let text = element.text_content();
    let base_score = base_tag_score(element);
    let class_weight = class_id_weight(element, config);
    let content_density = density_of(&text, config);
    let ld = link_density(element);

    let content_rich = text.chars().count() > 500;
    let link_penalty = if class_weight > 0.0 || content_rich { 1.0 - ld * 0.5 } else { 1.0 - ld };
    let code_penalty = if looks_like_code(&element.tag_name(), &text) { -10.0 } else { 0.0 };

    let final_score = (base_score + class_weight + content_density + code_penalty) * link_penalty;

    ScoreResult { base_score, class_weight, content_density, link_density: ld, final_score }
}
