//! Final touches before content is handed to a viewer.
//!
//! Media URLs are routed through a fetching proxy so images behind hotlink
//! protection or mixed-content rules still load inside a sandboxed view.

use url::form_urlencoded;

use crate::preprocess::rewrite_html;
use crate::refine::repair::repair_iframes;
use crate::urls::{is_data_uri, parse_srcset};

/// `<proxy_base>?url=<encoded>` for absolute http(s) URLs; anything else
/// (data URIs, relative or already proxied URLs) is returned as is.
pub fn proxied_url(value: &str, proxy_base: &str) -> String {
    let trimmed = value.trim();
    let lower = trimmed.get(..8).unwrap_or(trimmed).to_ascii_lowercase();
    let is_http = lower.starts_with("http://") || lower.starts_with("https://");
    if is_data_uri(trimmed) || !is_http || trimmed.starts_with(proxy_base) {
        return value.to_string();
    }
    let encoded: String = form_urlencoded::byte_serialize(trimmed.as_bytes()).collect();
    let separator = if proxy_base.contains('?') { '&' } else { '?' };
    format!("{proxy_base}{separator}url={encoded}")
}

fn proxied_srcset(value: &str, proxy_base: &str) -> String {
    parse_srcset(value)
        .into_iter()
        .map(|entry| {
            let url = proxied_url(&entry.url, proxy_base);
            match (entry.width, entry.density) {
                (Some(w), _) => format!("{url} {w}w"),
                (None, Some(d)) => format!("{url} {d}x"),
                (None, None) => url,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrites `img[src]`, `img[srcset]`, `source[srcset]` and `video[poster]`
/// through `proxy_base`, and gives lazy iframes their deferred `src`.
///
/// ```rust
/// use gleaner_core::present::rewrite_through_proxy;
///
/// let html = r#"<img src="https://example.com/a.jpg?w=1">"#;
/// assert_eq!(
///     rewrite_through_proxy(html, "http://localhost:8080/proxy"),
///     r#"<img src="http://localhost:8080/proxy?url=https%3A%2F%2Fexample.com%2Fa.jpg%3Fw%3D1">"#
/// );
/// ```
pub fn rewrite_through_proxy(html: &str, proxy_base: &str) -> String {
    let rewritten = rewrite_html(
        html,
        vec![
            lol_html::element!("img[src]", |el| {
                if let Some(src) = el.get_attribute("src") {
                    el.set_attribute("src", &proxied_url(&src, proxy_base)).ok();
                }
                Ok(())
            }),
            lol_html::element!("img[srcset], source[srcset]", |el| {
                if let Some(srcset) = el.get_attribute("srcset") {
                    el.set_attribute("srcset", &proxied_srcset(&srcset, proxy_base)).ok();
                }
                Ok(())
            }),
            lol_html::element!("video[poster]", |el| {
                if let Some(poster) = el.get_attribute("poster") {
                    el.set_attribute("poster", &proxied_url(&poster, proxy_base)).ok();
                }
                Ok(())
            }),
        ],
    );
    repair_iframes(&rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY: &str = "http://127.0.0.1:9000/proxy";

    #[test]
    fn test_proxied_url() {
        assert_eq!(
            proxied_url("https://cdn.example.com/a b.png", PROXY),
            "http://127.0.0.1:9000/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa+b.png"
        );
        assert_eq!(proxied_url("data:image/gif;base64,R0lGOD", PROXY), "data:image/gif;base64,R0lGOD");
        assert_eq!(proxied_url("/relative.png", PROXY), "/relative.png");

        let once = proxied_url("https://example.com/x.jpg", PROXY);
        assert_eq!(proxied_url(&once, PROXY), once);
        assert!(proxied_url("https://example.com/x.jpg", "https://app.example/p?k=1").contains("?k=1&url="));
    }

    #[test]
    fn test_rewrite_media() {
        let html = r#"<picture><source srcset="https://e.com/a.webp 1x, https://e.com/b.webp 2x"><img src="https://e.com/a.jpg" srcset="https://e.com/a.jpg 800w"></picture><video poster="https://e.com/p.jpg"></video><a href="https://e.com/page">link</a>"#;
        let result = rewrite_through_proxy(html, PROXY);

        assert!(result.contains(&format!("srcset=\"{PROXY}?url=https%3A%2F%2Fe.com%2Fa.webp 1x, {PROXY}?url=https%3A%2F%2Fe.com%2Fb.webp 2x\"")));
        assert!(result.contains(&format!("src=\"{PROXY}?url=https%3A%2F%2Fe.com%2Fa.jpg\"")));
        assert!(result.contains(&format!("srcset=\"{PROXY}?url=https%3A%2F%2Fe.com%2Fa.jpg 800w\"")));
        assert!(result.contains(&format!("poster=\"{PROXY}?url=https%3A%2F%2Fe.com%2Fp.jpg\"")));
        assert!(result.contains(r#"href="https://e.com/page""#));
    }

    #[test]
    fn test_lazy_iframe_promoted() {
        let html = r#"<iframe data-src="https://www.youtube.com/embed/abc"></iframe>"#;
        assert!(rewrite_through_proxy(html, PROXY).contains(r#"src="https://www.youtube.com/embed/abc""#));
    }
}
