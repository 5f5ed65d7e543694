//! Mouse event arguments.

use super::KeyModifiers;

/// Mouse button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// A mouse event (`click`, `dblclick`, `mousedown`, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseEvent {
    pub client_x: i32,
    pub client_y: i32,
    pub button: MouseButton,
    /// Click count (`1` for `click`, `2` for `dblclick`).
    pub detail: u32,
    pub modifiers: KeyModifiers,
}

impl MouseEvent {
    /// A single left click at the origin.
    #[must_use]
    pub fn click() -> Self {
        Self {
            detail: 1,
            ..Self::default()
        }
    }

    /// A left double click at the origin.
    #[must_use]
    pub fn double_click() -> Self {
        Self {
            detail: 2,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.client_x = x;
        self.client_y = y;
        self
    }

    #[must_use]
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
