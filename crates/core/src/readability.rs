//! Main content extraction API.
//!
//! The entry point is [`Readability`], along with the [`extract_article`] and
//! [`can_extract_article`] convenience functions.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::{ExtractOptions, extract_article};
//!
//! let paragraph = "<p>Readable prose goes here, with commas, clauses and enough length to count.</p>";
//! let html = format!(
//!     "<html><head><title>A Story</title></head><body><article>{}</article></body></html>",
//!     paragraph.repeat(8)
//! );
//! let article = extract_article(&html, &ExtractOptions::default()).unwrap();
//! assert_eq!(article.title, "A Story");
//! ```

use url::Url;

use crate::article::{ArticleContent, fragment_text};
use crate::dom_tree::DomEdits;
use crate::extract::{ExtractConfig, extract_content, max_element_score};
use crate::parse::{Document, Element};
use crate::postprocess::{PostProcessConfig, postprocess_html};
use crate::preprocess::{PreprocessConfig, absolutize_urls, inject_base, preprocess_html, unwrap_escaped_markup};
use crate::refine::refine_article;
use crate::scoring::ScoreConfig;

/// Content containers tried, in order, inside an `<article>` fallback.
const FALLBACK_CONTENT_SELECTORS: &[&str] =
    &[".post-content", ".entry-content", ".article-content", ".content", "[class*=content]"];

/// Subregions dropped from an `<article>` fallback.
const FALLBACK_NOISE: &str =
    "aside, nav, form, [class*=share], [class*=social], [class*=comment], [id*=comment], [class*=related]";

/// Pages shorter than this are never worth extracting.
const MIN_EXTRACTABLE_CHARS: usize = 500;

/// Configuration for the Readability engine.
///
/// # Example
///
/// ```rust
/// use gleaner_core::ReadabilityConfig;
///
/// let config = ReadabilityConfig::builder()
///     .min_score(25.0)
///     .char_threshold(500)
///     .min_text_length(100)
///     .build();
/// assert_eq!(config.nb_top_candidates, 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReadabilityConfig {
    /// Minimum score for the top candidate (default: 20.0).
    pub min_score: f64,

    /// Paragraph character threshold (default: 500).
    pub char_threshold: usize,

    /// Number of top candidates considered (default: 5).
    pub nb_top_candidates: usize,

    /// Maximum elements to scan (0 = unlimited, default: 0).
    pub max_elems_to_parse: usize,

    /// Whether to unwrap unlikely candidates before scoring (default: true).
    pub remove_unlikely: bool,

    /// Whether to keep class attributes in the output (default: false).
    pub keep_classes: bool,

    /// Minimum plain-text length of an accepted article (default: 250).
    pub min_text_length: usize,
}

impl Default for ReadabilityConfig {
    fn default() -> Self {
        Self {
            min_score: 20.0,
            char_threshold: 500,
            nb_top_candidates: 5,
            max_elems_to_parse: 0,
            remove_unlikely: true,
            keep_classes: false,
            min_text_length: 250,
        }
    }
}

impl ReadabilityConfig {
    /// Creates a new builder for ReadabilityConfig.
    pub fn builder() -> ReadabilityConfigBuilder {
        ReadabilityConfigBuilder::new()
    }
}

/// Builder for [`ReadabilityConfig`].
#[derive(Debug, Default)]
pub struct ReadabilityConfigBuilder {
    config: ReadabilityConfig,
}

impl ReadabilityConfigBuilder {
    pub fn new() -> Self {
        Self { config: ReadabilityConfig::default() }
    }

    pub fn min_score(mut self, value: f64) -> Self {
        self.config.min_score = value;
        self
    }

    pub fn char_threshold(mut self, value: usize) -> Self {
        self.config.char_threshold = value;
        self
    }

    pub fn nb_top_candidates(mut self, value: usize) -> Self {
        self.config.nb_top_candidates = value;
        self
    }

    pub fn max_elems_to_parse(mut self, value: usize) -> Self {
        self.config.max_elems_to_parse = value;
        self
    }

    pub fn remove_unlikely(mut self, value: bool) -> Self {
        self.config.remove_unlikely = value;
        self
    }

    pub fn keep_classes(mut self, value: bool) -> Self {
        self.config.keep_classes = value;
        self
    }

    pub fn min_text_length(mut self, value: usize) -> Self {
        self.config.min_text_length = value;
        self
    }

    pub fn build(self) -> ReadabilityConfig {
        self.config
    }
}

/// Per-call extraction options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOptions {
    /// Page URL used to resolve relative links.
    pub url: Option<String>,
    /// Overrides [`ReadabilityConfig::min_text_length`].
    pub min_text_length: Option<usize>,
}

impl ExtractOptions {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), min_text_length: None }
    }

    /// The parsed page URL; invalid URLs are ignored.
    pub fn base_url(&self) -> Option<Url> {
        let raw = self.url.as_deref()?;
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!(url = raw, error = %e, "ignoring unparsable page url");
                None
            }
        }
    }
}

/// The Readability engine.
///
/// # Example
///
/// ```rust
/// use gleaner_core::{ExtractOptions, Readability};
///
/// let reader = Readability::new();
/// let nav = "<html><body><nav><a href=\"/\">Home</a></nav></body></html>";
/// assert!(reader.extract(nav, &ExtractOptions::default()).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Readability {
    config: ReadabilityConfig,
}

impl Readability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReadabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReadabilityConfig {
        &self.config
    }

    /// Unwraps double-escaped bodies and resolves URLs against the page URL,
    /// injecting a `<base>` element. The result is the reference document for
    /// image recovery.
    pub fn prepare(&self, html: &str, url: Option<&Url>) -> String {
        let html = unwrap_escaped_markup(html).unwrap_or_else(|| html.to_string());
        match url {
            Some(base) => inject_base(&absolutize_urls(&html, base), base),
            None => html,
        }
    }

    /// Extracts the article from raw HTML.
    pub fn extract(&self, html: &str, options: &ExtractOptions) -> Option<ArticleContent> {
        let url = options.base_url();
        let prepared = self.prepare(html, url.as_ref());
        self.extract_prepared(&prepared, options)
    }

    /// Extracts the article, then recovers dropped images and removes
    /// duplicates against the original page.
    pub fn extract_refined(&self, html: &str, options: &ExtractOptions) -> Option<ArticleContent> {
        let url = options.base_url();
        let prepared = self.prepare(html, url.as_ref());
        let article = self.extract_prepared(&prepared, options)?;
        Some(refine_article(article, &prepared, url.as_ref()))
    }

    /// Extracts the article from HTML already passed through [`Readability::prepare`].
    pub fn extract_prepared(&self, prepared: &str, options: &ExtractOptions) -> Option<ArticleContent> {
        let url = options.base_url();
        let min_length = options.min_text_length.unwrap_or(self.config.min_text_length);
        let doc = Document::parse(prepared);

        let scoring_doc = Document::parse(&preprocess_html(prepared, &self.preprocess_config()));
        let scored = match extract_content(&scoring_doc, &self.extract_config()) {
            Ok(extracted) if !extracted.content.trim().is_empty() => Some(extracted.content),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "scoring found no content");
                None
            }
        };

        let content = match scored {
            Some(content) => content,
            None => self.article_fallback(&doc, min_length)?,
        };

        let metadata = doc.extract_metadata(url.as_ref());
        let Some(title) = metadata.title else {
            tracing::debug!("rejecting extraction without a title");
            return None;
        };

        let article = ArticleContent::new(title, metadata.byline, content, metadata.excerpt, metadata.site_name);
        if article.length < min_length {
            tracing::debug!(length = article.length, min_length, "rejecting short extraction");
            return None;
        }
        Some(article)
    }

    /// Quick check whether a page is worth extracting.
    ///
    /// False for inputs under 500 characters; otherwise true when some block
    /// scores at least the configured minimum.
    pub fn can_extract(&self, html: &str) -> bool {
        if html.chars().count() < MIN_EXTRACTABLE_CHARS {
            return false;
        }
        let doc = Document::parse(&preprocess_html(html, &self.preprocess_config()));
        max_element_score(&doc, &ScoreConfig::default()) >= self.config.min_score
    }

    fn preprocess_config(&self) -> PreprocessConfig {
        PreprocessConfig { remove_unlikely: self.config.remove_unlikely, ..Default::default() }
    }

    fn extract_config(&self) -> ExtractConfig {
        ExtractConfig {
            min_score_threshold: self.config.min_score,
            max_top_candidates: self.config.nb_top_candidates,
            char_threshold: self.config.char_threshold,
            max_elements: self.config.max_elems_to_parse,
            postprocess: self.postprocess_config(),
            ..Default::default()
        }
    }

    fn postprocess_config(&self) -> PostProcessConfig {
        PostProcessConfig { keep_classes: self.config.keep_classes, ..Default::default() }
    }

    /// Uses the page's `<article>` directly when scoring fails.
    fn article_fallback(&self, doc: &Document, min_length: usize) -> Option<String> {
        let article = doc.select_first("article")?;
        let container = FALLBACK_CONTENT_SELECTORS
            .iter()
            .find_map(|selector| article.select(selector).ok().and_then(|found| found.into_iter().next()))
            .unwrap_or(article);

        let content = postprocess_html(&strip_noise(container), &self.postprocess_config());
        let length = fragment_text(&content).chars().count();
        if length < min_length {
            tracing::debug!(length, min_length, "article fallback too short");
            return None;
        }
        Some(content)
    }
}

fn strip_noise(container: Element<'_>) -> String {
    let mut edits = DomEdits::new();
    for noise in container.select(FALLBACK_NOISE).unwrap_or_default() {
        edits.remove(noise.id());
    }
    edits.render_outer(container)
}

/// Extracts an article with the default configuration.
pub fn extract_article(html: &str, options: &ExtractOptions) -> Option<ArticleContent> {
    Readability::new().extract(html, options)
}

/// Quick readability check with the default configuration.
pub fn can_extract_article(html: &str) -> bool {
    Readability::new().can_extract(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_html() -> String {
        let paragraph = "<p>This is a long paragraph with plenty of content, text, commas, and meaningful sentences \
                         that a reader would actually want to read from start to finish.</p>";
        format!(
            r#"<!DOCTYPE html>
            <html lang="en">
            <head>
                <title>Test Article</title>
                <meta name="author" content="Test Author">
            </head>
            <body>
                <header class="site-header"><nav><a href="/">Home</a> <a href="/world">World</a></nav></header>
                <div id="main">
                    <article class="main-content">
                        <h1>Test Article</h1>
                        {p}{p}{p}{p}
                        <img src="/images/lead.jpg" alt="Lead photo">
                    </article>
                    <aside class="related"><a href="/other">Other story with a long headline</a></aside>
                </div>
                <footer>Copyright</footer>
            </body>
            </html>"#,
            p = paragraph
        )
    }

    #[test]
    fn test_readability_config_builder() {
        let config = ReadabilityConfig::builder()
            .min_score(30.0)
            .char_threshold(1000)
            .nb_top_candidates(10)
            .max_elems_to_parse(500)
            .remove_unlikely(false)
            .keep_classes(true)
            .min_text_length(100)
            .build();

        assert_eq!(config.min_score, 30.0);
        assert_eq!(config.char_threshold, 1000);
        assert_eq!(config.nb_top_candidates, 10);
        assert_eq!(config.max_elems_to_parse, 500);
        assert!(!config.remove_unlikely);
        assert!(config.keep_classes);
        assert_eq!(config.min_text_length, 100);
        assert_eq!(ReadabilityConfig::default().min_text_length, 250);
    }

    #[test]
    fn test_extract_article() {
        let options = ExtractOptions::with_url("https://news.example.com/2024/story");
        let article = extract_article(&article_html(), &options).unwrap();

        assert_eq!(article.title, "Test Article");
        assert_eq!(article.byline.as_deref(), Some("Test Author"));
        assert_eq!(article.site_name.as_deref(), Some("news.example.com"));
        assert!(article.content.contains("meaningful sentences"));
        assert!(article.content.contains(r#"src="https://news.example.com/images/lead.jpg""#));
        assert!(!article.content.contains("Copyright"));
        assert!(!article.content.contains("Other story"));
        assert!(article.length >= 250);
        assert!(!article.excerpt.is_empty());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let options = ExtractOptions::with_url("https://news.example.com/story");
        let first = extract_article(&article_html(), &options);
        let second = extract_article(&article_html(), &options);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_refined_prepends_title() {
        let options = ExtractOptions::with_url("https://news.example.com/story");
        let article = Readability::new().extract_refined(&article_html(), &options).unwrap();
        assert!(article.content.starts_with("<h1>Test Article</h1>"));
        assert_eq!(article.content.matches("<h1>").count(), 1);
        assert!(article.content.contains("lead.jpg"));
    }

    #[test]
    fn test_no_chrome_outside_main_region() {
        let article = extract_article(&article_html(), &ExtractOptions::default()).unwrap();
        let doc = Document::parse_fragment(&article.content);
        for el in doc.select("aside, nav, header").unwrap() {
            assert!(crate::postprocess::in_main_region(&el), "stray <{}>", el.tag_name());
        }
    }

    #[test]
    fn test_short_content_rejected() {
        let html = "<html><head><title>Tiny</title></head><body><article><p>Too short to keep.</p></article></body></html>";
        assert!(extract_article(html, &ExtractOptions::default()).is_none());

        let relaxed = ExtractOptions { url: None, min_text_length: Some(5) };
        let article = extract_article(html, &relaxed).unwrap();
        assert!(article.content.contains("Too short to keep."));
    }

    #[test]
    fn test_missing_title_rejected() {
        let html = article_html().replace("<title>Test Article</title>", "").replace("<h1>Test Article</h1>", "");
        assert!(extract_article(&html, &ExtractOptions::default()).is_none());
    }

    #[test]
    fn test_article_fallback_uses_content_container() {
        let body = "Fallback prose that scoring refuses to pick up but the article element still holds. ".repeat(4);
        let html = format!(
            r#"<html><head><title>Fallback</title></head><body><article>
                <div class="share-bar"><a href="/s">Share</a></div>
                <div class="entry-content">{body}</div>
            </article></body></html>"#
        );
        let reader = Readability::with_config(ReadabilityConfig::builder().min_score(1000.0).build());
        let article = reader.extract(&html, &ExtractOptions::default()).unwrap();

        assert!(article.content.contains("Fallback prose"));
        assert!(!article.content.contains("Share"));
    }

    #[test]
    fn test_double_escaped_body() {
        let inner = article_html();
        let escaped = format!("<html><body>{}</body></html>", html_escape::encode_text(&inner));
        let article = extract_article(&escaped, &ExtractOptions::default()).unwrap();
        assert_eq!(article.title, "Test Article");
    }

    #[test]
    fn test_can_extract_article() {
        assert!(!can_extract_article("<html><body><p>short</p></body></html>"));
        assert!(can_extract_article(&article_html()));

        let nav = format!("<html><body><nav>{}</nav></body></html>", r#"<a href="/x">link</a> "#.repeat(40));
        assert!(!can_extract_article(&nav));
    }
}
