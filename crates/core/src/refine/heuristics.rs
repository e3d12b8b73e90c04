//! Image predicates used by the recovery, filter and dedup passes.
//!
//! Each predicate looks at one `<img>` and its ancestor chain only, so they
//! can be checked in isolation.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::parse::Element;
use crate::postprocess::in_main_region;
use crate::urls::{absolutize, is_data_uri, largest_srcset_url, parse_srcset};

/// Images narrower than this are thumbnails.
pub const MIN_IMAGE_WIDTH: u32 = 400;

/// Images narrower than this must qualify as a main image to be kept.
pub const MAIN_IMAGE_WIDTH: u32 = 800;

/// Marker attribute for images classified as the article's main image.
pub const MAIN_IMAGE_ATTR: &str = "data-main-image";

/// Attributes carrying the deferred source of a lazy image, in priority order.
pub const LAZY_SOURCE_ATTRS: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-full-src",
    "data-hi-res-src",
    "data-url",
    "data-srcset",
    "data-lazy-srcset",
];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)placeholder|blank|spacer|transparent|loading|lazy|pixel|1x1|default|gr[ae]y\.gif|empty").unwrap()
});

static PIXEL_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/1x1\.|pixel\.").unwrap());

static AVATAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)avatar|author|byline|journalist|headshot|gravatar|profile-(?:pic|photo|image)").unwrap());

static AUTHOR_REGION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)author|byline|journalist").unwrap());

static EXCLUDED_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)comp-box|recirculation|post-tags|post-source|social|share|newsletter|subscription|comments?\b|related|sidebar|widget|promo|advert|\bads?\b",
    )
    .unwrap()
});

static EXCLUDED_DATA_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:recirculation|ads?|widget|promo)(?:[-_].*)?$").unwrap());

static MAIN_IMAGE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)wp-post-image|featured|hero|lead-?(?:image|media|photo)|main-image|article-image|post-thumbnail|attachment-full|size-full|story-image",
    )
    .unwrap()
});

static GALLERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)gallery|photoswipe|pswp").unwrap());

static STYLE_WIDTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:^|;)\s*width\s*:\s*(\d+)px").unwrap());

static HIDDEN_STYLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").unwrap());

static FILENAME_SIZE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d{2,4})x(\d{2,4})").unwrap());

static FILENAME_WIDTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[-_/]w_?(\d{3,4})(?:[-_,./]|$)").unwrap());

/// Lowercased `class` and `id` of an element joined for pattern matching.
fn class_and_id(element: &Element<'_>) -> String {
    format!("{} {}", element.class_name(), element.attr("id").unwrap_or("")).to_lowercase()
}

fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|w| *w > 0)
}

/// Whether an image source is a placeholder rather than the real image.
pub fn is_placeholder_url(src: &str) -> bool {
    let src = src.trim();
    src.len() < 5 || is_data_uri(src) || PLACEHOLDER.is_match(src) || PIXEL_PATH.is_match(src)
}

/// Tracking beacons: a `pixel.`/`1x1.` path, or declared at most 1x1.
pub fn is_tracking_pixel(img: &Element<'_>, src: &str) -> bool {
    let tiny = |name: &str| img.attr(name).and_then(|v| v.trim().parse::<u32>().ok()).is_some_and(|v| v <= 1);
    PIXEL_PATH.is_match(src) || (tiny("width") && tiny("height"))
}

/// The deferred source stored in a lazy-loading data attribute, if any.
pub fn data_source(img: &Element<'_>, base: Option<&Url>) -> Option<String> {
    LAZY_SOURCE_ATTRS.iter().find_map(|name| {
        let value = img.attr(name)?.trim();
        let candidate = if name.ends_with("srcset") { largest_srcset_url(value)? } else { value.to_string() };
        (!candidate.is_empty() && !is_data_uri(&candidate)).then(|| absolutize(base, &candidate))
    })
}

/// The best usable source: data attribute, then largest `srcset` entry, then `src`.
/// `data:` URIs never count as usable.
pub fn resolve_src(img: &Element<'_>, base: Option<&Url>) -> Option<String> {
    data_source(img, base)
        .or_else(|| img.attr("srcset").and_then(largest_srcset_url).filter(|s| !is_data_uri(s)))
        .or_else(|| img.attr("src").map(str::trim).filter(|s| !s.is_empty() && !is_data_uri(s)).map(String::from))
        .map(|s| absolutize(base, &s))
}

/// Every URL an image already shows: `src`, data sources and `srcset` entries.
pub fn image_urls(img: &Element<'_>, base: Option<&Url>) -> Vec<String> {
    let mut urls: Vec<String> = ["src"]
        .iter()
        .chain(LAZY_SOURCE_ATTRS.iter().filter(|n| !n.ends_with("srcset")))
        .filter_map(|name| img.attr(name))
        .map(|v| absolutize(base, v))
        .collect();
    for name in ["srcset", "data-srcset", "data-lazy-srcset"] {
        if let Some(value) = img.attr(name) {
            urls.extend(parse_srcset(value).into_iter().map(|e| absolutize(base, &e.url)));
        }
    }
    urls.retain(|u| !u.trim().is_empty() && !is_data_uri(u));
    urls
}

/// Rendered width: `width` attribute, natural size, inline style, then a
/// dimension pattern in the file name (or a `w` descriptor in `srcset`).
pub fn resolve_width(img: &Element<'_>, src: Option<&str>) -> Option<u32> {
    if let Some(width) = img.attr("width").and_then(leading_number) {
        return Some(width);
    }
    if let Some(width) = ["data-natural-width", "data-orig-width", "data-width"]
        .iter()
        .find_map(|name| img.attr(name).and_then(leading_number))
    {
        return Some(width);
    }
    if let Some(caps) = img.attr("style").and_then(|s| STYLE_WIDTH.captures(s)) {
        return caps[1].parse().ok();
    }
    if let Some(src) = src {
        let file = src.split(['?', '#']).next().unwrap_or(src);
        if let Some(caps) = FILENAME_SIZE.captures_iter(file).last() {
            return caps[1].parse().ok();
        }
        if let Some(caps) = FILENAME_WIDTH.captures(file) {
            return caps[1].parse().ok();
        }
    }
    ["srcset", "data-srcset"]
        .iter()
        .filter_map(|name| img.attr(name))
        .flat_map(parse_srcset)
        .filter_map(|e| e.width)
        .max()
}

/// Avatars, bylines and header images: by own class/id, a `header` or
/// `address` ancestor, or an author-ish ancestor class.
pub fn is_avatar(img: &Element<'_>) -> bool {
    if AVATAR.is_match(&class_and_id(img)) {
        return true;
    }
    img.ancestors()
        .any(|a| a.is("header") || a.is("address") || AUTHOR_REGION.is_match(&class_and_id(&a)))
}

/// Whether the image sits in an `<aside>`.
pub fn in_aside(img: &Element<'_>) -> bool {
    img.closest("aside").is_some()
}

/// Whether the element is (or sits in) a gallery or photoswipe widget.
pub fn is_gallery_element(element: &Element<'_>) -> bool {
    GALLERY.is_match(&class_and_id(element)) || element.attrs().any(|(name, _)| name.starts_with("data-pswp"))
}

pub fn in_gallery(img: &Element<'_>) -> bool {
    is_gallery_element(img) || img.ancestors().any(|a| is_gallery_element(&a))
}

/// Whether the image is wrapped in a `<figure>` that also carries a caption.
pub fn has_figure_caption(img: &Element<'_>) -> bool {
    img.closest("figure")
        .and_then(|figure| figure.select("figcaption").ok())
        .is_some_and(|captions| captions.iter().any(|c| !c.text_content().trim().is_empty()))
}

/// Main images: explicitly marked, CMS lead-image classes on the image or its
/// wrapper, captioned figures, gallery members, or one of the first three
/// images of the container (`position` is the zero-based container index).
pub fn is_main_image(img: &Element<'_>, position: Option<usize>) -> bool {
    if img.attr(MAIN_IMAGE_ATTR) == Some("true") {
        return true;
    }
    if MAIN_IMAGE_CLASS.is_match(&class_and_id(img))
        || img.parent_element().is_some_and(|p| MAIN_IMAGE_CLASS.is_match(&class_and_id(&p)))
    {
        return true;
    }
    has_figure_caption(img) || in_gallery(img) || position.is_some_and(|p| p < 3)
}

/// Normalized alt text or figure caption, when longer than 10 characters.
pub fn signature(img: &Element<'_>) -> Option<String> {
    let normalize = |text: &str| text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let alt = img.attr("alt").map(normalize).filter(|a| a.chars().count() > 10);
    alt.or_else(|| {
        let figure = img.closest("figure")?;
        let caption = figure.select("figcaption").ok()?.into_iter().next()?;
        Some(normalize(&caption.text_content())).filter(|c| c.chars().count() > 10)
    })
}

/// Hidden by inline style or a `.responsive` duplicate.
pub fn is_hidden(img: &Element<'_>) -> bool {
    let hidden = |e: &Element<'_>| e.has_class("responsive") || e.attr("style").is_some_and(|s| HIDDEN_STYLE.is_match(s));
    hidden(img) || img.ancestors().take(3).any(|a| hidden(&a))
}

/// Whether the element belongs to an ad, widget, recirculation or share region by class, id or data attribute.
pub fn is_excluded_region(element: &Element<'_>) -> bool {
    EXCLUDED_REGION.is_match(&class_and_id(element))
        || element
            .attrs()
            .any(|(name, value)| name.starts_with("data-") && EXCLUDED_DATA_VALUE.is_match(value.trim()))
}

/// Whether the image lives inside article content rather than page chrome.
pub fn in_article_content(img: &Element<'_>) -> bool {
    if is_excluded_region(img) {
        return false;
    }
    img.ancestors().all(|a| match a.tag_name().as_str() {
        "nav" | "aside" => false,
        "header" | "footer" => in_main_region(&a),
        _ => !is_excluded_region(&a),
    })
}
