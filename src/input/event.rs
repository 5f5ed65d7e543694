//! Event arguments delivered to component event handlers.

use super::{KeyEvent, MouseEvent};

/// Arguments of a triggered DOM event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Event {
    /// An event without arguments (`submit`, `reset`, ...).
    #[default]
    Empty,
    /// Mouse event.
    Mouse(MouseEvent),
    /// Keyboard event.
    Key(KeyEvent),
    /// `change` / `input` event carrying the new value.
    Change(ChangeEvent),
    /// Focus gained or lost.
    Focus(FocusEvent),
}

impl Event {
    /// Get the key event if this is one.
    #[must_use]
    pub fn key(&self) -> Option<&KeyEvent> {
        match self {
            Self::Key(e) => Some(e),
            _ => None,
        }
    }

    /// Get the mouse event if this is one.
    #[must_use]
    pub fn mouse(&self) -> Option<&MouseEvent> {
        match self {
            Self::Mouse(e) => Some(e),
            _ => None,
        }
    }

    /// The value of a change event.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Change(e) => Some(&e.value),
            _ => None,
        }
    }
}

impl From<KeyEvent> for Event {
    fn from(e: KeyEvent) -> Self {
        Self::Key(e)
    }
}

impl From<MouseEvent> for Event {
    fn from(e: MouseEvent) -> Self {
        Self::Mouse(e)
    }
}

impl From<ChangeEvent> for Event {
    fn from(e: ChangeEvent) -> Self {
        Self::Change(e)
    }
}

impl From<FocusEvent> for Event {
    fn from(e: FocusEvent) -> Self {
        Self::Focus(e)
    }
}

/// A change of an input's value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub value: String,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Focus event (gained or lost).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusEvent {
    Gained,
    Lost,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;

    #[test]
    fn test_event_accessors() {
        let key = Event::from(KeyEvent::new(KeyCode::Enter));
        assert!(key.key().is_some());
        assert!(key.mouse().is_none());

        let change = Event::from(ChangeEvent::new("hello"));
        assert_eq!(change.value(), Some("hello"));
        assert_eq!(Event::default(), Event::Empty);
    }
}
