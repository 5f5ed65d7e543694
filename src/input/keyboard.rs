//! Keyboard event arguments.
//!
//! Keys are named the way the DOM names them in `KeyboardEvent.key`, so a
//! test can write `key_down("Enter")` or `key_down('x')`.

use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// Modifier keys held during a keyboard or mouse event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 1;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
        /// Command on macOS, the Windows key elsewhere.
        const META = 1 << 3;
    }
}

/// A key, by its DOM `key` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character, including space.
    Char(char),
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    /// `F1` to `F24`.
    F(u8),
}

static NAMED: [(&str, KeyCode); 13] = [
    ("Enter", KeyCode::Enter),
    ("Escape", KeyCode::Escape),
    ("Tab", KeyCode::Tab),
    ("Backspace", KeyCode::Backspace),
    ("Delete", KeyCode::Delete),
    ("ArrowUp", KeyCode::ArrowUp),
    ("ArrowDown", KeyCode::ArrowDown),
    ("ArrowLeft", KeyCode::ArrowLeft),
    ("ArrowRight", KeyCode::ArrowRight),
    ("Home", KeyCode::Home),
    ("End", KeyCode::End),
    ("PageUp", KeyCode::PageUp),
    ("PageDown", KeyCode::PageDown),
];

impl KeyCode {
    /// Parse a DOM key value such as `"Enter"`, `"F5"` or `"a"`.
    #[must_use]
    pub fn from_dom_key(key: &str) -> Option<Self> {
        if let Some((_, code)) = NAMED.iter().find(|(name, _)| *name == key) {
            return Some(*code);
        }
        if let Some(n) = key.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
            if (1..=24).contains(&n) {
                return Some(Self::F(n));
            }
        }
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Self::Char(c)),
            _ => None,
        }
    }

    /// The DOM `KeyboardEvent.key` value.
    #[must_use]
    pub fn dom_key(&self) -> Cow<'static, str> {
        match self {
            Self::Char(c) => Cow::Owned(c.to_string()),
            Self::F(n) => Cow::Owned(format!("F{n}")),
            named => NAMED
                .iter()
                .find(|(_, code)| code == named)
                .map_or(Cow::Borrowed(""), |(name, _)| Cow::Borrowed(*name)),
        }
    }

    #[must_use]
    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(c) => Some(*c),
            _ => None,
        }
    }
}

/// Arguments of a `keydown`, `keyup` or `keypress` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
    /// Set for events generated by holding the key down.
    pub repeat: bool,
}

impl KeyEvent {
    #[must_use]
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::empty(),
            repeat: false,
        }
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// The DOM `key` value.
    #[must_use]
    pub fn key(&self) -> Cow<'static, str> {
        self.code.dom_key()
    }

    #[must_use]
    pub fn ctrl_key(&self) -> bool {
        self.modifiers.contains(KeyModifiers::CTRL)
    }

    #[must_use]
    pub fn shift_key(&self) -> bool {
        self.modifiers.contains(KeyModifiers::SHIFT)
    }

    #[must_use]
    pub fn alt_key(&self) -> bool {
        self.modifiers.contains(KeyModifiers::ALT)
    }

    #[must_use]
    pub fn meta_key(&self) -> bool {
        self.modifiers.contains(KeyModifiers::META)
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self::new(code)
    }
}

impl From<char> for KeyEvent {
    fn from(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }
}

/// Unknown key names become [`KeyCode::Char`] of their first character.
impl From<&str> for KeyEvent {
    fn from(key: &str) -> Self {
        let code = KeyCode::from_dom_key(key)
            .unwrap_or_else(|| KeyCode::Char(key.chars().next().unwrap_or(' ')));
        Self::new(code)
    }
}
