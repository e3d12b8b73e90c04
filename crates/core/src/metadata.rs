use url::Url;

use crate::Document;

/// Longest excerpt kept, in characters.
const EXCERPT_LIMIT: usize = 300;

/// Separators between an article title and the site name in `<title>`.
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " — ", " :: ", " » "];

/// Fallback headline selectors tried after the page's own title.
const HEADLINE_SELECTORS: &[&str] = &[
    "h1",
    "article h1",
    "article h2",
    "[itemprop=headline]",
    "[class*=headline]",
    "[class*=article-title]",
    "[class*=post-title]",
    "[class*=entry-title]",
    "[class*=title]",
];

/// Metadata that travels with an extracted article.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
}

/// Decodes entities left in a title (`Fish &amp;amp; Chips`) as plain text.
pub fn decode_entities(value: &str) -> String {
    html_escape::decode_html_entities(value).trim().to_string()
}

fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().split_whitespace().collect::<Vec<_>>().join(" ");
    (!trimmed.is_empty()).then_some(trimmed)
}

impl Document {
    /// The page's own title:
    /// 1. JSON-LD `headline`
    /// 2. Open Graph `og:title`
    /// 3. Twitter `twitter:title`
    /// 4. `<title>` with a trailing or leading site name removed
    pub fn extract_title(&self) -> Option<String> {
        if let Some(json_ld) = self.extract_json_ld()
            && let Some(headline) = json_ld.get("headline").and_then(|h| h.as_str())
            && let Some(title) = non_empty(headline)
        {
            return Some(title);
        }

        self.get_meta_content("og:title")
            .or_else(|| self.get_meta_content("twitter:title"))
            .or_else(|| self.title().map(|t| clean_document_title(&t)))
            .and_then(non_empty)
    }

    /// Resolves the article title: the page's own title, then headline
    /// elements, then the raw document title. Entities are decoded.
    pub fn resolve_title(&self) -> Option<String> {
        self.extract_title()
            .or_else(|| {
                HEADLINE_SELECTORS.iter().find_map(|selector| {
                    self.select(selector)
                        .unwrap_or_default()
                        .iter()
                        .find_map(|el| non_empty(el.text_content()))
                })
            })
            .or_else(|| self.title())
            .map(|t| decode_entities(&t))
            .filter(|t| !t.is_empty())
    }

    /// Byline with priority fallback:
    /// 1. JSON-LD `author`
    /// 2. Meta `author`
    /// 3. `[rel=author]`, `[itemprop=author]`
    /// 4. `.byline` and author-ish classes
    pub fn extract_byline(&self) -> Option<String> {
        if let Some(json_ld) = self.extract_json_ld()
            && let Some(author) = json_ld.get("author")
            && let Some(name) = author_from_json_ld(author)
        {
            return Some(name);
        }

        if let Some(author) = self.get_meta_content("author") {
            return Some(author);
        }

        for selector in ["[rel=author]", "[itemprop=author]", ".byline", "[class*=byline]", "[class*=author]"] {
            for el in self.select(selector).unwrap_or_default().iter().take(3) {
                if let Some(text) = non_empty(el.text_content())
                    && text.chars().count() < 100
                {
                    return Some(text);
                }
            }
        }
        None
    }

    /// Excerpt with priority fallback:
    /// 1. JSON-LD `description`
    /// 2. Open Graph `og:description`
    /// 3. Meta `description`
    /// 4. First paragraph longer than 50 characters, cut at 300
    pub fn extract_excerpt(&self) -> Option<String> {
        if let Some(json_ld) = self.extract_json_ld()
            && let Some(desc) = json_ld.get("description").and_then(|d| d.as_str())
            && let Some(desc) = non_empty(desc)
        {
            return Some(desc);
        }

        if let Some(desc) = self.get_meta_content("og:description").or_else(|| self.get_meta_content("description")) {
            return Some(desc);
        }

        self.select("p")
            .unwrap_or_default()
            .iter()
            .take(5)
            .filter_map(|p| non_empty(p.text_content()))
            .find(|text| text.chars().count() > 50)
            .map(|text| truncate_chars(&text, EXCERPT_LIMIT))
    }

    /// Site name: JSON-LD `publisher.name`, `og:site_name`, then the URL host.
    pub fn extract_site_name(&self, url: Option<&Url>) -> Option<String> {
        if let Some(json_ld) = self.extract_json_ld()
            && let Some(name) = json_ld.pointer("/publisher/name").and_then(|n| n.as_str())
            && let Some(name) = non_empty(name)
        {
            return Some(name);
        }

        self.get_meta_content("og:site_name")
            .or_else(|| url.and_then(|u| u.host_str()).map(|h| h.trim_start_matches("www.").to_string()))
    }

    /// Extracts all metadata at once.
    pub fn extract_metadata(&self, url: Option<&Url>) -> Metadata {
        Metadata {
            title: self.resolve_title(),
            byline: self.extract_byline(),
            excerpt: self.extract_excerpt(),
            site_name: self.extract_site_name(url),
        }
    }

    /// Meta tag content by `name` or `property`.
    fn get_meta_content(&self, attr: &str) -> Option<String> {
        [format!(r#"meta[name="{attr}"]"#), format!(r#"meta[property="{attr}"]"#)]
            .iter()
            .find_map(|selector| self.select_first(selector).and_then(|el| el.attr("content")).and_then(non_empty))
    }

    /// First JSON-LD block that parses, unwrapping `@graph` arrays to their article node.
    fn extract_json_ld(&self) -> Option<serde_json::Value> {
        self.select(r#"script[type="application/ld+json"]"#)
            .unwrap_or_default()
            .iter()
            .filter_map(|el| serde_json::from_str::<serde_json::Value>(el.text().trim()).ok())
            .map(|value| match value.get("@graph").and_then(|g| g.as_array()) {
                Some(graph) => graph
                    .iter()
                    .find(|node| node.get("headline").is_some())
                    .cloned()
                    .unwrap_or(value),
                None => value,
            })
            .next()
    }
}

/// Author name from a JSON-LD `author` value (string, object or array).
fn author_from_json_ld(author: &serde_json::Value) -> Option<String> {
    match author {
        serde_json::Value::String(name) => non_empty(name),
        serde_json::Value::Object(obj) => obj.get("name").and_then(|n| n.as_str()).and_then(non_empty),
        serde_json::Value::Array(items) => items.first().and_then(author_from_json_ld),
        _ => None,
    }
}

/// Drops a site name glued to the title when the remaining part still reads as a title.
fn clean_document_title(title: &str) -> String {
    for sep in TITLE_SEPARATORS {
        if let Some((head, tail)) = title.rsplit_once(sep) {
            let (head, tail) = (head.trim(), tail.trim());
            if head.split_whitespace().count() >= 3 {
                return head.to_string();
            }
            if tail.split_whitespace().count() >= 3 {
                return tail.to_string();
            }
        }
    }
    title.trim().to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
