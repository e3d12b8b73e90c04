//! Extraction result type.
//!
//! [`ArticleContent`] is produced once per extraction call and owned by the
//! caller. `length` is the character count of the trimmed plain text and is
//! also the success gate for extraction.

use serde::{Deserialize, Serialize};

use crate::parse::Document;

/// Output format for an extracted article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The content fragment as HTML.
    #[default]
    Html,
    /// Plain text only.
    PlainText,
    /// All fields as JSON.
    Json,
}

/// The result of reading an HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleContent {
    pub title: String,
    pub byline: Option<String>,
    /// Readable content as an HTML fragment.
    pub content: String,
    /// Plain text of `content`.
    pub text_content: String,
    /// Characters in the trimmed plain text.
    pub length: usize,
    pub excerpt: String,
    pub site_name: Option<String>,
}

impl ArticleContent {
    /// Builds an article from a content fragment, computing the text fields.
    pub fn new(
        title: String, byline: Option<String>, content: String, excerpt: Option<String>, site_name: Option<String>,
    ) -> Self {
        let text_content = fragment_text(&content);
        let length = text_content.chars().count();
        let excerpt = excerpt.unwrap_or_else(|| first_sentence_excerpt(&text_content));
        Self { title, byline, content, text_content, length, excerpt, site_name }
    }

    /// Replaces the content fragment, recomputing the text fields.
    pub fn with_content(mut self, content: String) -> Self {
        self.text_content = fragment_text(&content);
        self.length = self.text_content.chars().count();
        self.content = content;
        self
    }

    /// Renders the article in the requested format.
    pub fn to_format(&self, format: OutputFormat) -> crate::Result<String> {
        match format {
            OutputFormat::Html => Ok(self.content.clone()),
            OutputFormat::PlainText => Ok(self.text_content.clone()),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Readable text of an HTML fragment with whitespace runs collapsed.
pub fn fragment_text(html: &str) -> String {
    let text = Document::parse_fragment(html).text_content();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_sentence_excerpt(text: &str) -> String {
    let end = text.find(". ").map(|i| i + 1).unwrap_or(text.len());
    match text[..end].char_indices().nth(300) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text[..end].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArticleContent {
        ArticleContent::new(
            "Title".to_string(),
            Some("Ada".to_string()),
            "<h1>Title</h1>\n<p>First   sentence. Second sentence.</p><script>x()</script>".to_string(),
            None,
            None,
        )
    }

    #[test]
    fn test_text_and_length() {
        let article = sample();
        assert_eq!(article.text_content, "Title First sentence. Second sentence.");
        assert_eq!(article.length, article.text_content.chars().count());
    }

    #[test]
    fn test_excerpt_fallback_to_first_sentence() {
        assert_eq!(sample().excerpt, "Title First sentence.");
    }

    #[test]
    fn test_with_content_recomputes_length() {
        let article = sample().with_content("<p>abc</p>".to_string());
        assert_eq!(article.length, 3);
        assert_eq!(article.text_content, "abc");
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = sample().to_format(OutputFormat::Json).unwrap();
        assert!(json.contains("\"textContent\""));
        assert!(json.contains("\"siteName\": null"));
    }
}
