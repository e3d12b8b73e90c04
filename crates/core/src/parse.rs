//! HTML parsing and DOM navigation.
//!
//! This module provides the [`Document`] and [`Element`] types for parsing
//! HTML and navigating the tree using CSS selectors. Elements keep their
//! [`NodeId`] so that passes can record edits against them (see
//! [`crate::dom_tree::DomEdits`]) and walk their real ancestors.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <h1>Title</h1>
//!             <p class="content">Paragraph</p>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! let paragraphs = doc.select("p.content").unwrap();
//! assert_eq!(paragraphs.len(), 1);
//! ```

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

use crate::{GleanerError, Result};

/// Elements whose text never counts as readable text.
const NON_TEXT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Compiles a CSS selector, mapping parse failures to [`GleanerError::InvalidSelector`].
pub fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| GleanerError::InvalidSelector { selector: selector.to_string(), reason: e.to_string() })
}

/// Represents a parsed HTML document or fragment.
///
/// # Example
///
/// ```rust
/// use gleaner_core::parse::Document;
///
/// let html = "<html><head><title>Test</title></head><body><p>Hello</p></body></html>";
/// let doc = Document::parse(html);
/// assert_eq!(doc.title(), Some("Test".to_string()));
/// ```
pub struct Document {
    html: Html,
    fragment: bool,
}

impl Document {
    /// Parses a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html), fragment: false }
    }

    /// Parses an HTML fragment (e.g. extracted article content).
    ///
    /// The fragment's nodes become children of a synthetic `<html>` root,
    /// which [`Document::content_root`] returns.
    pub fn parse_fragment(html: &str) -> Self {
        Self { html: Html::parse_fragment(html), fragment: true }
    }

    /// Whether this document was parsed as a fragment.
    pub fn is_fragment(&self) -> bool {
        self.fragment
    }

    /// Gets the underlying `scraper::Html`.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Gets the entire HTML as a string.
    pub fn as_string(&self) -> String {
        self.html.html()
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`GleanerError::InvalidSelector`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gleaner_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html);
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile_selector(selector)?;
        Ok(self.html.select(&sel).map(Element::new).collect())
    }

    /// Selects the first element matching a CSS selector, if any.
    pub fn select_first(&'_ self, selector: &str) -> Option<Element<'_>> {
        let sel = compile_selector(selector).ok()?;
        self.html.select(&sel).next().map(Element::new)
    }

    /// Looks an element up by node id.
    pub fn element(&'_ self, id: NodeId) -> Option<Element<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap).map(Element::new)
    }

    /// The `<body>` element of a document, if present.
    pub fn body(&'_ self) -> Option<Element<'_>> {
        self.select_first("body")
    }

    /// The element whose children are the meaningful content: the synthetic
    /// root of a fragment, or `<body>` (falling back to `<html>`) for a document.
    pub fn content_root(&'_ self) -> Element<'_> {
        if !self.fragment
            && let Some(body) = self.body()
        {
            return body;
        }
        Element::new(self.html.root_element())
    }

    /// Gets the title of the document.
    ///
    /// Returns the trimmed content of the `<title>` element if present.
    pub fn title(&self) -> Option<String> {
        self.select_first("title")
            .map(|el| el.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Gets readable text content of the document.
    ///
    /// Text inside `script`, `style`, `noscript` and `template` is skipped.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self.html.tree.root(), &mut out);
        out
    }
}

/// A wrapper around scraper's ElementRef for easier DOM navigation.
///
/// # Example
///
/// ```rust
/// use gleaner_core::parse::Document;
///
/// let html = r#"<a href="https://example.com">Link text</a>"#;
/// let doc = Document::parse(html);
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.element.id() == other.element.id()
    }
}

impl Eq for Element<'_> {}

impl<'a> Element<'a> {
    pub(crate) fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    /// The stable node id of this element within its document.
    pub fn id(&self) -> NodeId {
        self.element.id()
    }

    /// The underlying tree node.
    pub fn node(&self) -> NodeRef<'a, Node> {
        *self.element
    }

    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets all text nodes within this element, concatenated.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets readable text: like [`Element::text`] but skipping script-like content.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(*self.element, &mut out);
        out
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Whether the attribute is present (even if empty).
    pub fn has_attr(&self, name: &str) -> bool {
        self.element.value().attr(name).is_some()
    }

    /// Iterates `(name, value)` attribute pairs in source order.
    pub fn attrs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.element.value().attrs()
    }

    /// Gets the tag name of this element, lowercased.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Whether this element has the given tag name.
    pub fn is(&self, tag: &str) -> bool {
        self.element.value().name().eq_ignore_ascii_case(tag)
    }

    /// The class attribute, or an empty string.
    pub fn class_name(&self) -> &'a str {
        self.attr("class").unwrap_or("")
    }

    /// The class tokens of this element.
    pub fn classes(&self) -> Vec<&'a str> {
        self.class_name().split_whitespace().collect()
    }

    /// Whether the element carries exactly this class token.
    pub fn has_class(&self, class: &str) -> bool {
        self.class_name().split_whitespace().any(|c| c == class)
    }

    /// The closest parent that is an element.
    pub fn parent_element(&self) -> Option<Element<'a>> {
        self.element.parent().and_then(ElementRef::wrap).map(Element::new)
    }

    /// All element ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        self.element.ancestors().filter_map(ElementRef::wrap).map(Element::new)
    }

    /// Direct element children.
    pub fn child_elements(&self) -> impl Iterator<Item = Element<'a>> + 'a {
        self.element.children().filter_map(ElementRef::wrap).map(Element::new)
    }

    /// Previous sibling that is an element.
    pub fn prev_element_sibling(&self) -> Option<Element<'a>> {
        self.element.prev_siblings().find_map(ElementRef::wrap).map(Element::new)
    }

    /// Next sibling that is an element.
    pub fn next_element_sibling(&self) -> Option<Element<'a>> {
        self.element.next_siblings().find_map(ElementRef::wrap).map(Element::new)
    }

    /// Whether `other` is a strict descendant of this element.
    pub fn contains(&self, other: &Element<'_>) -> bool {
        other.element.ancestors().any(|a| a.id() == self.element.id())
    }

    /// The nearest ancestor (or self) with the given tag.
    pub fn closest(&self, tag: &str) -> Option<Element<'a>> {
        if self.is(tag) {
            return Some(*self);
        }
        self.ancestors().find(|a| a.is(tag))
    }

    /// Selects descendant elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`GleanerError::InvalidSelector`] if the selector is invalid.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile_selector(selector)?;
        Ok(self.element.select(&sel).map(Element::new).collect())
    }

    /// Selects descendants with an already compiled selector.
    pub fn select_with(&self, selector: &Selector) -> Vec<Element<'a>> {
        self.element.select(selector).map(Element::new).collect()
    }

    /// Whether this element itself matches the compiled selector.
    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(&self.element)
    }
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if NON_TEXT_TAGS.contains(&el.name()) => {}
            Node::Element(_) => collect_text(child, out),
            _ => {}
        }
    }
}
