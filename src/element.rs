//! Element handles and event triggering.

use crate::dom::{ElementNode, Selector, select_all};
use crate::error::{Error, Result};
use crate::fragment::RenderedFragment;
use crate::input::{ChangeEvent, Event, FocusEvent, KeyEvent, MouseEvent};

/// An element of a rendered fragment, located by selector and match index.
///
/// The element is looked up again on every access, so a handle stays valid
/// across re-renders as long as something still matches.
#[derive(Clone, Debug)]
pub struct Element {
    fragment: RenderedFragment,
    selector: Selector,
    index: usize,
}

impl Element {
    pub(crate) fn new(fragment: RenderedFragment, selector: Selector, index: usize) -> Self {
        Self {
            fragment,
            selector,
            index,
        }
    }

    #[must_use]
    pub fn selector(&self) -> &str {
        self.selector.as_str()
    }

    /// The current element node.
    pub fn node(&self) -> Result<ElementNode> {
        let nodes = self.fragment.nodes()?;
        select_all(&nodes, &self.selector)
            .get(self.index)
            .map(|element| (*element).clone())
            .ok_or_else(|| Error::ElementNotFound {
                selector: self.selector.as_str().to_string(),
            })
    }

    pub fn tag_name(&self) -> Result<String> {
        Ok(self.node()?.tag)
    }

    pub fn attr(&self, name: &str) -> Result<Option<String>> {
        Ok(self.node()?.attr(name).map(str::to_string))
    }

    pub fn has_class(&self, class: &str) -> Result<bool> {
        Ok(self.node()?.has_class(class))
    }

    pub fn text_content(&self) -> Result<String> {
        Ok(self.node()?.text_content())
    }

    /// Markup of the element including its own tag.
    pub fn markup(&self) -> Result<String> {
        Ok(self.node()?.outer_markup())
    }

    pub fn inner_markup(&self) -> Result<String> {
        Ok(self.node()?.inner_markup())
    }

    /// Trigger `event` and wait until the handler and the renders it caused
    /// have completed.
    pub fn trigger_event(&self, event: &str, args: impl Into<Event>) -> Result<()> {
        let node = self.node()?;
        let binding = node
            .handler(event)
            .cloned()
            .ok_or_else(|| Error::MissingEventHandler {
                event: event.to_string(),
                element: node.tag.clone(),
            })?;
        let args = args.into();
        self.fragment
            .dispatcher()
            .invoke(move |tree| tree.dispatch_event(&binding, &args))
    }

    pub fn click(&self) -> Result<()> {
        self.trigger_event("click", MouseEvent::click())
    }

    pub fn double_click(&self) -> Result<()> {
        self.trigger_event("dblclick", MouseEvent::double_click())
    }

    pub fn change(&self, value: impl Into<String>) -> Result<()> {
        self.trigger_event("change", ChangeEvent::new(value))
    }

    pub fn input(&self, value: impl Into<String>) -> Result<()> {
        self.trigger_event("input", ChangeEvent::new(value))
    }

    pub fn key_down(&self, key: impl Into<KeyEvent>) -> Result<()> {
        self.trigger_event("keydown", key.into())
    }

    pub fn key_up(&self, key: impl Into<KeyEvent>) -> Result<()> {
        self.trigger_event("keyup", key.into())
    }

    pub fn focus(&self) -> Result<()> {
        self.trigger_event("focus", FocusEvent::Gained)
    }

    pub fn blur(&self) -> Result<()> {
        self.trigger_event("blur", FocusEvent::Lost)
    }

    pub fn submit(&self) -> Result<()> {
        self.trigger_event("submit", Event::Empty)
    }
}
