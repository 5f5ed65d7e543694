//! `rendertest` - deterministic unit testing for component-based UIs
//!
//! Components are rendered in isolation on a dedicated dispatch thread.
//! Test code inspects the rendered markup, triggers events, and waits for
//! asynchronous updates with render-aware helpers that re-check their
//! condition after every completed render instead of polling.
//!
//! ```
//! use rendertest::prelude::*;
//!
//! #[derive(Default)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Component for Counter {
//!     fn render(&self, b: &mut RenderTreeBuilder) {
//!         b.element("p", |b| b.add_content(format!("Current count: {}", self.count)));
//!         b.open_element("button");
//!         b.add_event_handler("click", "increment");
//!         b.close_element();
//!     }
//!
//!     fn handle_event(&mut self, _: &str, _: &Event, _: &mut ComponentContext<'_>) -> Result<()> {
//!         self.count += 1;
//!         Ok(())
//!     }
//! }
//!
//! let ctx = TestContext::new()?;
//! let cut = ctx.render::<Counter>(Parameters::new())?;
//! cut.find("button")?.click()?;
//! assert_eq!(cut.find("p")?.text_content()?, "Current count: 1");
//! # Ok::<(), rendertest::Error>(())
//! ```

// Crate-level lint configuration
#![allow(clippy::module_name_repetitions)] // Allow RenderedComponent::render etc
#![allow(clippy::missing_errors_doc)] // Docs WIP
#![allow(clippy::missing_panics_doc)] // Docs WIP
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::needless_pass_by_value)] // Closures and parameters are taken by value on purpose
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine
#![allow(clippy::semicolon_if_nothing_returned)] // Style preference
#![allow(clippy::significant_drop_tightening)] // Guards are held for the whole check on purpose

pub mod component;
pub mod config;
pub mod context;
pub mod dom;
pub mod element;
pub mod error;
pub mod event;
pub mod fragment;
pub mod input;
pub mod renderer;
pub mod wait;

// Re-export core types at crate root
pub use component::{
    CHILD_CONTENT, Component, ComponentContext, ComponentHandle, ComponentId, FromParam,
    ParamValue, Parameters, RenderFragment, RenderTreeBuilder,
};
pub use config::{TestContextOptions, default_wait_timeout, set_default_wait_timeout};
pub use context::TestContext;
pub use dom::{DomNode, ElementNode, Selector};
pub use element::Element;
pub use error::{Error, Result, WaitFailureKind, WaitForFailed};
pub use event::{LogLevel, clear_log_callback, emit_log, set_log_callback};
pub use fragment::{RenderedComponent, RenderedFragment};

// Re-export input types
pub use input::{ChangeEvent, Event, FocusEvent, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent};

// Re-export renderer types
pub use renderer::{
    ChangeFlags, ComponentChange, ComponentTree, Dispatcher, RenderEvent, TestRenderer,
    UnhandledError,
};
pub use wait::{CheckerErrorPolicy, WaitFor, WaitForHelper, WaitOptions, WaitTask};

/// The types most tests need.
pub mod prelude {
    pub use crate::component::{
        Component, ComponentContext, ComponentHandle, Parameters, RenderTreeBuilder,
    };
    pub use crate::context::TestContext;
    pub use crate::element::Element;
    pub use crate::error::{Error, Result};
    pub use crate::fragment::{RenderedComponent, RenderedFragment};
    pub use crate::input::{ChangeEvent, Event, KeyCode, KeyEvent, MouseEvent};
    pub use crate::wait::WaitFor;
}
