//! Edit plans over a parsed tree.
//!
//! `scraper` trees are read-mostly, so DOM passes record what they want to
//! change in a [`DomEdits`] keyed by [`NodeId`] and then re-serialize the tree
//! with the edits applied. A pass that needs to observe its own edits
//! re-parses the rendered markup.
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::dom_tree::DomEdits;
//! use gleaner_core::parse::Document;
//!
//! let doc = Document::parse_fragment(r#"<p>keep</p><p class="ad">drop</p>"#);
//! let mut edits = DomEdits::new();
//! for ad in doc.select(".ad").unwrap() {
//!     edits.remove(ad.id());
//! }
//! assert_eq!(edits.render_inner(doc.content_root()), "<p>keep</p>");
//! ```

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::Node;

use crate::parse::{Document, Element};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript"];

/// Pending structural and attribute edits for one parsed tree.
#[derive(Debug, Default, Clone)]
pub struct DomEdits {
    removed: HashSet<NodeId>,
    unwrapped: HashSet<NodeId>,
    replaced: HashMap<NodeId, String>,
    set_attrs: HashMap<NodeId, Vec<(String, String)>>,
    removed_attrs: HashMap<NodeId, HashSet<String>>,
    before: HashMap<NodeId, Vec<String>>,
    after: HashMap<NodeId, Vec<String>>,
    prepended: HashMap<NodeId, Vec<String>>,
    appended: HashMap<NodeId, Vec<String>>,
}

impl DomEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no edit has been recorded.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.unwrapped.is_empty()
            && self.replaced.is_empty()
            && self.set_attrs.is_empty()
            && self.removed_attrs.is_empty()
            && self.before.is_empty()
            && self.after.is_empty()
            && self.prepended.is_empty()
            && self.appended.is_empty()
    }

    /// Drops the node and its subtree.
    pub fn remove(&mut self, id: NodeId) {
        self.removed.insert(id);
    }

    /// Whether the node was scheduled for removal.
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains(&id)
    }

    /// Whether the node or one of its ancestors is scheduled for removal or replacement.
    pub fn is_detached(&self, element: &Element<'_>) -> bool {
        let gone = |id: NodeId| self.removed.contains(&id) || self.replaced.contains_key(&id);
        gone(element.id()) || element.ancestors().any(|a| gone(a.id()))
    }

    /// Keeps the children but drops the element's own tag.
    pub fn unwrap(&mut self, id: NodeId) {
        self.unwrapped.insert(id);
    }

    /// Replaces the node (and subtree) with raw markup.
    pub fn replace(&mut self, id: NodeId, markup: impl Into<String>) {
        self.replaced.insert(id, markup.into());
    }

    /// Sets or overrides an attribute.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(removed) = self.removed_attrs.get_mut(&id) {
            removed.remove(name);
        }
        let attrs = self.set_attrs.entry(id).or_default();
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value,
            None => attrs.push((name.to_string(), value)),
        }
    }

    /// Removes an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(attrs) = self.set_attrs.get_mut(&id) {
            attrs.retain(|(n, _)| n != name);
        }
        self.removed_attrs.entry(id).or_default().insert(name.to_string());
    }

    pub fn insert_before(&mut self, id: NodeId, markup: impl Into<String>) {
        self.before.entry(id).or_default().push(markup.into());
    }

    pub fn insert_after(&mut self, id: NodeId, markup: impl Into<String>) {
        self.after.entry(id).or_default().push(markup.into());
    }

    /// Inserts markup as the first child. Repeated calls keep call order.
    pub fn prepend(&mut self, id: NodeId, markup: impl Into<String>) {
        self.prepended.entry(id).or_default().push(markup.into());
    }

    pub fn append(&mut self, id: NodeId, markup: impl Into<String>) {
        self.appended.entry(id).or_default().push(markup.into());
    }

    /// Serializes the element's children with the edits applied.
    pub fn render_inner(&self, element: Element<'_>) -> String {
        let mut out = String::new();
        self.write_children(element.node(), &mut out);
        out
    }

    /// Serializes the element itself with the edits applied.
    pub fn render_outer(&self, element: Element<'_>) -> String {
        let mut out = String::new();
        self.write_node(element.node(), &mut out);
        out
    }

    /// Serializes the meaningful content of a document: the full document for
    /// a page, the children of the synthetic root for a fragment.
    pub fn render(&self, doc: &Document) -> String {
        if doc.is_fragment() {
            return self.render_inner(doc.content_root());
        }
        let mut out = String::new();
        self.write_children(doc.html().tree.root(), &mut out);
        out
    }

    fn write_children(&self, node: NodeRef<'_, Node>, out: &mut String) {
        let id = node.id();
        if let Some(markup) = self.prepended.get(&id) {
            markup.iter().for_each(|m| out.push_str(m));
        }
        for child in node.children() {
            self.write_node(child, out);
        }
        if let Some(markup) = self.appended.get(&id) {
            markup.iter().for_each(|m| out.push_str(m));
        }
    }

    fn write_node(&self, node: NodeRef<'_, Node>, out: &mut String) {
        let id = node.id();
        if self.removed.contains(&id) {
            return;
        }
        if let Some(markup) = self.before.get(&id) {
            markup.iter().for_each(|m| out.push_str(m));
        }

        if let Some(markup) = self.replaced.get(&id) {
            out.push_str(markup);
        } else {
            match node.value() {
                Node::Document | Node::Fragment => self.write_children(node, out),
                Node::Doctype(doctype) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(doctype.name());
                    out.push('>');
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
                Node::Text(text) => {
                    let raw = node
                        .parent()
                        .and_then(|p| p.value().as_element().map(|e| RAW_TEXT_ELEMENTS.contains(&e.name())))
                        .unwrap_or(false);
                    if raw {
                        out.push_str(text);
                    } else {
                        out.push_str(&html_escape::encode_text(&**text));
                    }
                }
                Node::Element(_) if self.unwrapped.contains(&id) => self.write_children(node, out),
                Node::Element(element) => {
                    let name = element.name();
                    out.push('<');
                    out.push_str(name);
                    self.write_attrs(id, element.attrs(), out);
                    out.push('>');
                    if !VOID_ELEMENTS.contains(&name) {
                        self.write_children(node, out);
                        out.push_str("</");
                        out.push_str(name);
                        out.push('>');
                    }
                }
                Node::ProcessingInstruction(_) => {}
            }
        }

        if let Some(markup) = self.after.get(&id) {
            markup.iter().for_each(|m| out.push_str(m));
        }
    }

    fn write_attrs<'a>(&self, id: NodeId, attrs: impl Iterator<Item = (&'a str, &'a str)>, out: &mut String) {
        let removed = self.removed_attrs.get(&id);
        let overrides = self.set_attrs.get(&id);
        let mut written: Vec<&str> = Vec::new();
        let mut attrs: Vec<_> = attrs.collect();
        attrs.sort_by(|a, b| a.0.cmp(b.0));

        for (name, value) in attrs {
            if removed.is_some_and(|r| r.contains(name)) {
                continue;
            }
            let value = overrides
                .and_then(|o| o.iter().find(|(n, _)| n == name))
                .map(|(_, v)| v.as_str())
                .unwrap_or(value);
            push_attr(name, value, out);
            written.push(name);
        }

        if let Some(overrides) = overrides {
            for (name, value) in overrides {
                if !written.contains(&name.as_str()) {
                    push_attr(name, value, out);
                }
            }
        }
    }
}

fn push_attr(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&html_escape::encode_double_quoted_attribute(value));
    out.push('"');
}

/// Parses `html` as a fragment, lets `plan` record edits, and renders the result.
///
/// Returns the input untouched when no edit was recorded.
pub fn edit_fragment(html: &str, plan: impl FnOnce(&Document, &mut DomEdits)) -> String {
    let doc = Document::parse_fragment(html);
    let mut edits = DomEdits::new();
    plan(&doc, &mut edits);
    if edits.is_empty() { html.to_string() } else { edits.render(&doc) }
}

/// Serializes the children of an element without edits.
pub fn inner_markup(element: Element<'_>) -> String {
    DomEdits::new().render_inner(element)
}

/// Serializes an element without edits.
pub fn outer_markup(element: Element<'_>) -> String {
    DomEdits::new().render_outer(element)
}
