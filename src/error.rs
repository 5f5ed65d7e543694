//! Error types for rendertest.

use crate::component::ComponentId;
use std::fmt;
use std::io;
use std::time::Duration;

/// Result type alias for rendertest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rendertest operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error (spawning the dispatch or timer thread).
    Io(io::Error),
    /// A component lifecycle method or event handler reported a failure.
    Component {
        component: &'static str,
        message: String,
    },
    /// A dispatched work item panicked.
    Panicked(String),
    /// An assertion closure passed to a wait helper panicked.
    AssertionFailed(String),
    /// The component behind a rendered fragment has been disposed.
    ComponentDisposed(ComponentId),
    /// No element matched the selector.
    ElementNotFound { selector: String },
    /// No component of the requested type exists in the fragment.
    ComponentNotFound { type_name: &'static str },
    /// The element has no handler bound for the event.
    MissingEventHandler { event: String, element: String },
    /// The selector could not be parsed.
    InvalidSelector { selector: String, reason: String },
    /// A parameter was missing or had the wrong type.
    Parameter { name: String, message: String },
    /// A wait helper timed out or its checker failed.
    WaitFailed(Box<WaitForFailed>),
    /// A wait helper was disposed before it completed.
    WaitCanceled,
    /// The renderer has been disposed; the request was not run.
    RendererDisposed,
    /// A blocking dispatch was requested from the dispatch thread itself.
    ReentrantDispatch,
    /// Rendering did not settle within the configured number of passes.
    RenderLoop { passes: usize },
}

impl Error {
    /// Build a [`Error::Component`] for component type `C`.
    pub fn component<C: ?Sized>(message: impl Into<String>) -> Self {
        Self::Component {
            component: std::any::type_name::<C>(),
            message: message.into(),
        }
    }

    /// The wait failure details, if this is a [`Error::WaitFailed`].
    #[must_use]
    pub fn as_wait_failed(&self) -> Option<&WaitForFailed> {
        match self {
            Self::WaitFailed(failed) => Some(failed),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Component { component, message } => write!(f, "{component}: {message}"),
            Self::Panicked(msg) => write!(f, "dispatched work panicked: {msg}"),
            Self::AssertionFailed(msg) => write!(f, "assertion failed: {msg}"),
            Self::ComponentDisposed(id) => write!(f, "component {id} has been disposed"),
            Self::ElementNotFound { selector } => {
                write!(f, "no elements matched the selector '{selector}'")
            }
            Self::ComponentNotFound { type_name } => {
                write!(f, "no component of type {type_name} was found")
            }
            Self::MissingEventHandler { event, element } => {
                write!(f, "the element <{element}> has no '{event}' event handler")
            }
            Self::InvalidSelector { selector, reason } => {
                write!(f, "invalid selector '{selector}': {reason}")
            }
            Self::Parameter { name, message } => write!(f, "parameter '{name}': {message}"),
            Self::WaitFailed(failed) => failed.fmt(f),
            Self::WaitCanceled => write!(f, "the wait was canceled before it completed"),
            Self::RendererDisposed => write!(f, "the renderer has been disposed"),
            Self::ReentrantDispatch => {
                write!(f, "blocking dispatch requested from the dispatch thread")
            }
            Self::RenderLoop { passes } => {
                write!(f, "rendering did not settle after {passes} passes")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::WaitFailed(failed) => failed
                .inner
                .as_deref()
                .map(|e| e as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<WaitForFailed> for Error {
    fn from(failed: WaitForFailed) -> Self {
        Self::WaitFailed(Box::new(failed))
    }
}

/// Why a wait helper gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitFailureKind {
    /// The timeout elapsed before the checker passed.
    Timeout,
    /// The checker raised an error under a fail-fast policy.
    CheckerFailed,
}

/// Diagnostics for a failed wait.
#[derive(Debug)]
pub struct WaitForFailed {
    pub kind: WaitFailureKind,
    pub message: String,
    /// Times the checker was invoked, including the initial check.
    pub check_count: u64,
    /// Render count of the observed fragment when the wait failed.
    pub render_count: u64,
    /// Total component renders performed by the renderer.
    pub total_render_count: u64,
    /// The timeout in effect, `None` when unbounded.
    pub timeout: Option<Duration>,
    /// The last error raised by the checker, if any.
    pub inner: Option<Box<Error>>,
}

impl fmt::Display for WaitForFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Check count: {}. Component render count: {}. Total render count: {}.",
            self.message, self.check_count, self.render_count, self.total_render_count
        )?;
        if let Some(inner) = &self.inner {
            write!(f, " Last error: {inner}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WaitForFailed {}
