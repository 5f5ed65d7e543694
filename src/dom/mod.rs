//! Rendered markup as a queryable node tree.
//!
//! The dispatcher expands each component's render output (with child
//! components inlined) into [`DomNode`]s after every render pass. Fragments
//! serialize those nodes to HTML for [`markup`](crate::RenderedFragment::markup)
//! and match them against [`Selector`]s for `find`/`find_all`.

mod selector;

pub use selector::{Selector, select_all};

use crate::component::ComponentId;
use std::fmt::Write as _;

/// Elements rendered without a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A node of rendered output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomNode {
    /// An element with attributes, event bindings and children.
    Element(ElementNode),
    /// Text content, escaped on serialization.
    Text(String),
    /// Raw markup, emitted verbatim and opaque to selectors.
    Markup(String),
}

impl DomNode {
    /// The element, if this node is one.
    #[must_use]
    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Self::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
            Self::Text(text) | Self::Markup(text) => out.push_str(text),
        }
    }

    /// Serialize this node to HTML.
    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self);
        out
    }
}

/// An event handler bound to an element by the component that rendered it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventBinding {
    /// DOM event name, e.g. `click`.
    pub event: String,
    /// Component whose `handle_event` receives the event.
    pub component: ComponentId,
    /// Handler name passed to `handle_event`.
    pub handler: String,
}

/// A rendered element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub handlers: Vec<EventBinding>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    /// Value of the attribute `name` (case-insensitive).
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `id` attribute.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Whitespace separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// The binding for `event`, if any.
    #[must_use]
    pub fn handler(&self, event: &str) -> Option<&EventBinding> {
        self.handlers.iter().find(|binding| binding.event == event)
    }

    #[must_use]
    pub fn text_content(&self) -> String {
        self.children.iter().map(DomNode::text_content).collect()
    }

    /// Serialize the element, including its own tag.
    #[must_use]
    pub fn outer_markup(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self);
        out
    }

    /// Serialize the element's children.
    #[must_use]
    pub fn inner_markup(&self) -> String {
        to_markup(&self.children)
    }
}

/// Serialize a node sequence to HTML.
#[must_use]
pub fn to_markup(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &DomNode) {
    match node {
        DomNode::Element(element) => write_element(out, element),
        DomNode::Text(text) => escape_text(out, text),
        DomNode::Markup(raw) => out.push_str(raw),
    }
}

fn write_element(out: &mut String, element: &ElementNode) {
    let _ = write!(out, "<{}", element.tag);
    for (name, value) in &element.attributes {
        let _ = write!(out, " {name}=\"");
        escape_attribute(out, value);
        out.push('"');
    }
    out.push('>');

    if is_void(&element.tag) {
        return;
    }
    for child in &element.children {
        write_node(out, child);
    }
    let _ = write!(out, "</{}>", element.tag);
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

/// Escape `&`, `<` and `>` for text content.
pub fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

/// Escape text for a double-quoted attribute value.
pub fn escape_attribute(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<DomNode>) -> DomNode {
        DomNode::Element(ElementNode {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            handlers: Vec::new(),
            children,
        })
    }

    #[test]
    fn test_markup_serialization() {
        let nodes = vec![element(
            "p",
            &[("class", "lead")],
            vec![DomNode::Text("a < b & c".into())],
        )];
        assert_eq!(to_markup(&nodes), r#"<p class="lead">a &lt; b &amp; c</p>"#);
    }

    #[test]
    fn test_attribute_escaping() {
        let node = element("a", &[("title", "say \"hi\"")], vec![]);
        assert_eq!(node.to_markup(), r#"<a title="say &quot;hi&quot;"></a>"#);
    }

    #[test]
    fn test_void_elements_have_no_close_tag() {
        let node = element("input", &[("value", "x")], vec![]);
        assert_eq!(node.to_markup(), r#"<input value="x">"#);
    }

    #[test]
    fn test_raw_markup_is_verbatim() {
        let nodes = vec![DomNode::Markup("<b>bold</b>".into())];
        assert_eq!(to_markup(&nodes), "<b>bold</b>");
    }

    #[test]
    fn test_text_content_and_classes() {
        let node = element(
            "div",
            &[("class", "card  wide")],
            vec![
                DomNode::Text("one ".into()),
                element("span", &[], vec![DomNode::Text("two".into())]),
            ],
        );
        assert_eq!(node.text_content(), "one two");
        let el = node.as_element().unwrap();
        assert!(el.has_class("wide"));
        assert!(!el.has_class("card wide"));
        assert_eq!(el.attr("CLASS"), Some("card  wide"));
    }
}
