//! URL helpers shared by the extraction passes.
//!
//! Covers `srcset` parsing, resolution against a page URL, and the canonical
//! image key used to compare images across CDN resizes and query strings.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Path segments that only encode a rendition of the same image.
static SIZE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:\d{2,4}x\d{2,4}|[whcq]_[\w.]+(?:,[a-z]{1,2}_[\w.]+)*|thumbs?|thumbnails?|resized?|scaled|small|medium|large|crop(?:ped)?)$",
    )
    .unwrap()
});

/// `-300x200` style suffixes WordPress and friends add before the extension.
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-(?:\d{2,4}x\d{2,4}|scaled|thumb|thumbnail)(\.[a-z0-9]+)$").unwrap());

/// One candidate in a `srcset` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SrcsetEntry {
    pub url: String,
    /// Width descriptor (`800w`).
    pub width: Option<u32>,
    /// Pixel density descriptor (`2x`).
    pub density: Option<f32>,
}

/// Parses a `srcset` value into its candidates, skipping empty entries.
pub fn parse_srcset(value: &str) -> Vec<SrcsetEntry> {
    value
        .split(',')
        .filter_map(|part| {
            let mut tokens = part.split_whitespace();
            let url = tokens.next()?.to_string();
            let descriptor = tokens.next().unwrap_or("");
            let width = descriptor.strip_suffix('w').and_then(|w| w.parse().ok());
            let density = descriptor.strip_suffix('x').and_then(|d| d.parse().ok());
            Some(SrcsetEntry { url, width, density })
        })
        .collect()
}

/// The largest candidate of a `srcset`: widest by `w`, densest by `x`, else the last one.
pub fn largest_srcset_url(value: &str) -> Option<String> {
    let entries = parse_srcset(value);
    if entries.iter().any(|e| e.width.is_some()) {
        return entries.into_iter().max_by_key(|e| e.width.unwrap_or(0)).map(|e| e.url);
    }
    if entries.iter().any(|e| e.density.is_some()) {
        return entries
            .into_iter()
            .max_by(|a, b| a.density.unwrap_or(1.0).total_cmp(&b.density.unwrap_or(1.0)))
            .map(|e| e.url);
    }
    entries.into_iter().last().map(|e| e.url)
}

/// Resolves `value` against `base`; returns the input unchanged when it cannot be resolved.
pub fn absolutize(base: Option<&Url>, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || has_opaque_scheme(trimmed) {
        return value.to_string();
    }
    match base {
        Some(base) => base.join(trimmed).map(String::from).unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

/// Resolves every candidate of a `srcset` value against `base`.
pub fn absolutize_srcset(base: Option<&Url>, value: &str) -> String {
    parse_srcset(value)
        .into_iter()
        .map(|entry| {
            let url = absolutize(base, &entry.url);
            match (entry.width, entry.density) {
                (Some(w), _) => format!("{url} {w}w"),
                (None, Some(d)) => format!("{url} {d}x"),
                (None, None) => url,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn has_opaque_scheme(value: &str) -> bool {
    let lower = value.get(..11).unwrap_or(value).to_ascii_lowercase();
    ["data:", "javascript:", "mailto:", "tel:", "blob:"].iter().any(|s| lower.starts_with(s))
}

/// Whether the value is an inline `data:` URI.
pub fn is_data_uri(value: &str) -> bool {
    value.trim_start().get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Canonical key for an image URL: scheme, host and path with rendition
/// segments and size suffixes removed. Query strings and fragments are dropped.
///
/// Relative URLs are resolved against `base` first; unresolvable values are
/// keyed by their lowercased path.
///
/// ```rust
/// use gleaner_core::urls::normalize_image_url;
///
/// let a = normalize_image_url("https://cdn.example.com/img/600x400/photo-300x200.jpg?v=2", None);
/// let b = normalize_image_url("https://cdn.example.com/img/photo.jpg", None);
/// assert_eq!(a, b);
/// ```
pub fn normalize_image_url(value: &str, base: Option<&Url>) -> String {
    let resolved = match base {
        Some(base) => base.join(value.trim()).ok(),
        None => Url::parse(value.trim()).ok(),
    };

    let Some(url) = resolved else {
        let raw = value.trim().split(['?', '#']).next().unwrap_or("");
        return strip_rendition(raw).to_lowercase();
    };

    let host = url.host_str().unwrap_or("");
    format!("{}://{}{}", url.scheme(), host, strip_rendition(url.path()))
}

fn strip_rendition(path: &str) -> String {
    let kept: Vec<&str> = path.split('/').filter(|seg| !SIZE_SEGMENT.is_match(seg)).collect();
    let joined = kept.join("/");
    SIZE_SUFFIX.replace(&joined, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_srcset() {
        let entries = parse_srcset("a.jpg 320w, b.jpg 800w,c.jpg");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].url, "b.jpg");
        assert_eq!(entries[1].width, Some(800));
        assert_eq!(entries[2].width, None);
    }

    #[rstest]
    #[case("small.jpg 320w, large.jpg 1200w, mid.jpg 800w", "large.jpg")]
    #[case("a.jpg 1x, b.jpg 2x", "b.jpg")]
    #[case("first.jpg, last.jpg", "last.jpg")]
    fn test_largest_srcset_url(#[case] srcset: &str, #[case] expected: &str) {
        assert_eq!(largest_srcset_url(srcset).as_deref(), Some(expected));
    }

    #[test]
    fn test_absolutize() {
        let base = Url::parse("https://example.com/news/story.html").unwrap();
        assert_eq!(absolutize(Some(&base), "/img/a.jpg"), "https://example.com/img/a.jpg");
        assert_eq!(absolutize(Some(&base), "b.jpg"), "https://example.com/news/b.jpg");
        assert_eq!(absolutize(Some(&base), "#top"), "#top");
        assert_eq!(absolutize(Some(&base), "data:image/gif;base64,R0lG"), "data:image/gif;base64,R0lG");
        assert_eq!(absolutize(None, "b.jpg"), "b.jpg");
    }

    #[test]
    fn test_absolutize_srcset() {
        let base = Url::parse("https://example.com/a/").unwrap();
        assert_eq!(
            absolutize_srcset(Some(&base), "x.jpg 400w, /y.jpg 800w"),
            "https://example.com/a/x.jpg 400w, https://example.com/y.jpg 800w"
        );
    }

    #[rstest]
    #[case("https://cdn.example.com/photo.jpg?w=300", "https://cdn.example.com/photo.jpg")]
    #[case("https://cdn.example.com/thumbs/photo.jpg", "https://cdn.example.com/photo.jpg")]
    #[case("https://cdn.example.com/w_400,h_300/photo.jpg", "https://cdn.example.com/photo.jpg")]
    #[case("https://example.com/uploads/photo-1024x683.jpg", "https://example.com/uploads/photo.jpg")]
    #[case("HTTPS://Example.COM/a.png#frag", "https://example.com/a.png")]
    fn test_normalize_image_url(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_image_url(input, None), expected);
    }

    #[test]
    fn test_normalize_relative_against_base() {
        let base = Url::parse("https://example.com/post/").unwrap();
        assert_eq!(normalize_image_url("img.jpg?x=1", Some(&base)), "https://example.com/post/img.jpg");
    }

    #[test]
    fn test_is_data_uri() {
        assert!(is_data_uri("data:image/png;base64,AAAA"));
        assert!(is_data_uri("  DATA:image/gif,"));
        assert!(!is_data_uri("https://example.com/data:x"));
    }
}
