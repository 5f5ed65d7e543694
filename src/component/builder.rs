//! Render tree construction.

use super::{Component, ComponentId, Parameters};
use crate::event::{LogLevel, emit_log};
use std::any::{TypeId, type_name};
use std::sync::Arc;

/// A reusable piece of render output, typically passed as child content.
pub type RenderFragment = Arc<dyn Fn(&mut RenderTreeBuilder) + Send + Sync>;

/// Output of a component render, before child components are expanded.
#[derive(Clone, Debug)]
pub(crate) enum Frame {
    Element(ElementFrame),
    Text(String),
    Markup(String),
    Component(ComponentFrame),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ElementFrame {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    /// `(event, handler)` pairs.
    pub(crate) handlers: Vec<(String, String)>,
    pub(crate) children: Vec<Frame>,
}

/// Everything needed to create or update a child component.
#[derive(Clone)]
pub(crate) struct ComponentSpec {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) factory: fn() -> Box<dyn Component>,
    pub(crate) params: Parameters,
}

impl ComponentSpec {
    pub(crate) fn of<C: Component + Default>(params: Parameters) -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            factory: create::<C>,
            params,
        }
    }
}

impl std::fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("type_name", &self.type_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn create<C: Component + Default>() -> Box<dyn Component> {
    Box::new(C::default())
}

#[derive(Clone, Debug)]
pub(crate) struct ComponentFrame {
    pub(crate) spec: ComponentSpec,
    pub(crate) key: Option<String>,
    /// Assigned during reconciliation.
    pub(crate) id: Option<ComponentId>,
}

/// Builds the output of [`Component::render`].
///
/// ```
/// use rendertest::RenderTreeBuilder;
///
/// let mut b = RenderTreeBuilder::new();
/// b.open_element("button");
/// b.add_attribute("class", "primary");
/// b.add_event_handler("click", "increment");
/// b.add_content("Click me");
/// b.close_element();
/// ```
#[derive(Debug, Default)]
pub struct RenderTreeBuilder {
    root: Vec<Frame>,
    open: Vec<ElementFrame>,
}

impl RenderTreeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, frame: Frame) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(frame),
            None => self.root.push(frame),
        }
    }

    /// Open an element; subsequent attributes and content belong to it.
    pub fn open_element(&mut self, tag: &str) {
        self.open.push(ElementFrame {
            tag: tag.to_string(),
            ..ElementFrame::default()
        });
    }

    /// Close the innermost open element.
    pub fn close_element(&mut self) {
        match self.open.pop() {
            Some(element) => self.push(Frame::Element(element)),
            None => emit_log(LogLevel::Warn, "close_element called with no open element"),
        }
    }

    /// Open `tag`, run `content`, and close it.
    pub fn element(&mut self, tag: &str, content: impl FnOnce(&mut Self)) {
        self.open_element(tag);
        content(self);
        self.close_element();
    }

    /// Set an attribute on the innermost open element.
    pub fn add_attribute(&mut self, name: &str, value: impl Into<String>) {
        let Some(element) = self.open.last_mut() else {
            emit_log(LogLevel::Warn, "add_attribute called with no open element");
            return;
        };
        let value = value.into();
        match element.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(existing) => existing.1 = value,
            None => element.attributes.push((name.to_string(), value)),
        }
    }

    /// Bind the DOM `event` on the innermost open element to `handler`.
    ///
    /// When the event is triggered, the rendering component's
    /// [`Component::handle_event`] is called with `handler`.
    pub fn add_event_handler(&mut self, event: &str, handler: &str) {
        let Some(element) = self.open.last_mut() else {
            emit_log(LogLevel::Warn, "add_event_handler called with no open element");
            return;
        };
        element.handlers.retain(|(existing, _)| existing != event);
        element
            .handlers
            .push((event.to_string(), handler.to_string()));
    }

    /// Append text content (escaped in markup).
    pub fn add_content(&mut self, text: impl Into<String>) {
        self.push(Frame::Text(text.into()));
    }

    /// Append raw markup (emitted verbatim).
    pub fn add_markup_content(&mut self, markup: impl Into<String>) {
        self.push(Frame::Markup(markup.into()));
    }

    /// Render a child component.
    pub fn component<C: Component + Default>(&mut self, params: Parameters) {
        self.push(Frame::Component(ComponentFrame {
            spec: ComponentSpec::of::<C>(params),
            key: None,
            id: None,
        }));
    }

    /// Render a child component matched across renders by `key`.
    ///
    /// Keys must be unique among siblings of the same type.
    pub fn component_keyed<C: Component + Default>(
        &mut self,
        key: impl Into<String>,
        params: Parameters,
    ) {
        self.push(Frame::Component(ComponentFrame {
            spec: ComponentSpec::of::<C>(params),
            key: Some(key.into()),
            id: None,
        }));
    }

    /// Render a fragment in place.
    pub fn add_fragment(&mut self, fragment: &RenderFragment) {
        fragment(self);
    }

    /// Close any element left open and return the frames.
    pub(crate) fn finish(mut self) -> Vec<Frame> {
        while !self.open.is_empty() {
            self.close_element();
        }
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_elements() {
        let mut b = RenderTreeBuilder::new();
        b.element("ul", |b| {
            b.element("li", |b| b.add_content("one"));
            b.element("li", |b| b.add_content("two"));
        });
        let frames = b.finish();
        assert_eq!(frames.len(), 1);
        let Frame::Element(ul) = &frames[0] else {
            panic!("expected element");
        };
        assert_eq!(ul.tag, "ul");
        assert_eq!(ul.children.len(), 2);
    }

    #[test]
    fn test_attribute_replaces_existing() {
        let mut b = RenderTreeBuilder::new();
        b.open_element("div");
        b.add_attribute("class", "a");
        b.add_attribute("class", "b");
        b.add_event_handler("click", "first");
        b.add_event_handler("click", "second");
        let frames = b.finish();
        let Frame::Element(div) = &frames[0] else {
            panic!("expected element");
        };
        assert_eq!(div.attributes, vec![("class".to_string(), "b".to_string())]);
        assert_eq!(
            div.handlers,
            vec![("click".to_string(), "second".to_string())]
        );
    }

    #[test]
    fn test_unclosed_elements_are_closed_by_finish() {
        let mut b = RenderTreeBuilder::new();
        b.open_element("section");
        b.open_element("p");
        b.add_content("text");
        let frames = b.finish();
        assert_eq!(frames.len(), 1);
        let Frame::Element(section) = &frames[0] else {
            panic!("expected element");
        };
        assert!(matches!(&section.children[0], Frame::Element(p) if p.tag == "p"));
    }

    #[test]
    fn test_fragment_renders_in_place() {
        let fragment: RenderFragment = Arc::new(|b: &mut RenderTreeBuilder| b.add_content("inner"));
        let mut b = RenderTreeBuilder::new();
        b.element("div", |b| b.add_fragment(&fragment));
        let frames = b.finish();
        let Frame::Element(div) = &frames[0] else {
            panic!("expected element");
        };
        assert!(matches!(&div.children[0], Frame::Text(t) if t == "inner"));
    }
}
