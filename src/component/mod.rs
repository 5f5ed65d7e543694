//! The component model driven by the test renderer.
//!
//! A component owns its state, receives [`Parameters`] from its parent (or
//! from the test), and describes its output with a [`RenderTreeBuilder`].
//! All lifecycle methods run on the renderer's dispatch thread.
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
//!     fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
//!         if let Some(start) = params.get::<i64>("Start")? {
//!             self.count = start;
//!         }
//!         Ok(())
//!     }
//!
//!     fn render(&self, b: &mut RenderTreeBuilder) {
//!         b.element("p", |b| b.add_content(format!("Current count: {}", self.count)));
//!         b.open_element("button");
//!         b.add_event_handler("click", "increment");
//!         b.add_content("Click me");
//!         b.close_element();
//!     }
//!
//!     fn handle_event(
//!         &mut self,
//!         handler: &str,
//!         _event: &Event,
//!         _ctx: &mut ComponentContext<'_>,
//!     ) -> Result<()> {
//!         match handler {
//!             "increment" => {
//!                 self.count += 1;
//!                 Ok(())
//!             }
//!             other => Err(Error::component::<Self>(format!("unknown handler {other}"))),
//!         }
//!     }
//! }
//! ```

mod builder;
mod params;

pub use builder::{RenderFragment, RenderTreeBuilder};
pub use params::{CHILD_CONTENT, FromParam, ParamValue, Parameters};

pub(crate) use builder::{ComponentSpec, ElementFrame, Frame};

use crate::error::{Error, Result};
use crate::input::Event;
use crate::renderer::Dispatcher;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Identifier of a component instance within one renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u64);

impl ComponentId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access to a component as [`Any`] for downcasting.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A UI component.
///
/// Lifecycle order for a new instance: `set_parameters`, `on_initialized`,
/// `on_parameters_set`, `render`, then `on_after_render(true)` once the
/// dispatch item settles. A parent re-render that changes the parameters
/// repeats `set_parameters`, `on_parameters_set` and `render`.
#[allow(unused_variables)]
pub trait Component: AsAny + Send {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        Ok(())
    }

    fn on_initialized(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_parameters_set(&mut self, ctx: &mut ComponentContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Consulted before every render except the first.
    fn should_render(&self) -> bool {
        true
    }

    fn render(&self, builder: &mut RenderTreeBuilder);

    /// Handle an event bound with [`RenderTreeBuilder::add_event_handler`].
    ///
    /// The component re-renders after the handler returns `Ok`.
    fn handle_event(
        &mut self,
        handler: &str,
        event: &Event,
        ctx: &mut ComponentContext<'_>,
    ) -> Result<()> {
        Err(Error::component::<Self>(format!(
            "no event handler named '{handler}'"
        )))
    }

    fn on_after_render(&mut self, first_render: bool, ctx: &mut ComponentContext<'_>) -> Result<()> {
        Ok(())
    }

    fn dispose(&mut self) {}
}

/// Context passed to lifecycle methods.
pub struct ComponentContext<'a> {
    id: ComponentId,
    dispatcher: &'a Dispatcher,
    render_requested: bool,
}

impl<'a> ComponentContext<'a> {
    pub(crate) fn new(id: ComponentId, dispatcher: &'a Dispatcher) -> Self {
        Self {
            id,
            dispatcher,
            render_requested: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Re-render this component once the current dispatch item settles.
    pub fn state_has_changed(&mut self) {
        self.render_requested = true;
    }

    /// A handle for continuing work on this component from another thread.
    ///
    /// `T` must be the component's own type; invoking a handle of another
    /// type fails with [`Error::ComponentNotFound`].
    #[must_use]
    pub fn handle<T: Component>(&self) -> ComponentHandle<T> {
        ComponentHandle {
            id: self.id,
            dispatcher: self.dispatcher.clone(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        self.dispatcher
    }

    pub(crate) fn render_requested(&self) -> bool {
        self.render_requested
    }
}

/// A `Send` handle to a component, used by asynchronous continuations.
///
/// Requests made through a handle are posted to the dispatcher and run in
/// order with everything else. Errors they raise are delivered to an active
/// wait helper or to the renderer's unhandled-error slot.
pub struct ComponentHandle<T> {
    id: ComponentId,
    dispatcher: Dispatcher,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            dispatcher: self.dispatcher.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Component> ComponentHandle<T> {
    pub(crate) fn new(id: ComponentId, dispatcher: Dispatcher) -> Self {
        Self {
            id,
            dispatcher,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Queue a re-render of the component.
    pub fn state_has_changed(&self) -> Result<()> {
        let id = self.id;
        self.dispatcher.post(move |tree| {
            tree.request_render(id);
            Ok(())
        })
    }

    /// Queue `f` to run against the component on the dispatch thread.
    ///
    /// Call [`ComponentContext::state_has_changed`] inside `f` to re-render.
    /// A component disposed in the meantime is skipped.
    pub fn invoke<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut T, &mut ComponentContext<'_>) -> Result<()> + Send + 'static,
    {
        let id = self.id;
        self.dispatcher
            .post(move |tree| tree.with_instance_mut::<T, _, _>(id, f).map(|_| ()))
    }
}
