//! Event arguments for simulated user input.
//!
//! These are passed to [`Element::trigger_event`](crate::Element::trigger_event)
//! and its shorthands, and arrive in [`Component::handle_event`](crate::Component::handle_event).

mod event;
mod keyboard;
mod mouse;

pub use event::{ChangeEvent, Event, FocusEvent};
pub use keyboard::{KeyCode, KeyEvent, KeyModifiers};
pub use mouse::{MouseButton, MouseEvent};
