//! The entry point for a test.

use crate::component::{CHILD_CONTENT, Component, ComponentSpec, Parameters, RenderFragment, RenderTreeBuilder};
use crate::config::TestContextOptions;
use crate::error::Result;
use crate::fragment::{RenderedComponent, RenderedFragment};
use crate::renderer::{Dispatcher, TestRenderer};
use std::time::Duration;

/// Owns a renderer and renders components into it.
///
/// ```
/// use rendertest::prelude::*;
///
/// #[derive(Default)]
/// struct Hello;
///
/// impl Component for Hello {
///     fn render(&self, b: &mut RenderTreeBuilder) {
///         b.add_markup_content("hello world");
///     }
/// }
///
/// let ctx = TestContext::new()?;
/// let cut = ctx.render::<Hello>(Parameters::new())?;
/// assert_eq!(cut.markup()?, "hello world");
/// assert_eq!(cut.render_count(), 1);
/// # Ok::<(), rendertest::Error>(())
/// ```
#[derive(Debug)]
pub struct TestContext {
    renderer: TestRenderer,
}

impl TestContext {
    pub fn new() -> Result<Self> {
        Self::with_options(TestContextOptions::default())
    }

    pub fn with_options(options: TestContextOptions) -> Result<Self> {
        Ok(Self {
            renderer: TestRenderer::new(options)?,
        })
    }

    #[must_use]
    pub fn renderer(&self) -> &TestRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        self.renderer.dispatcher()
    }

    /// The timeout wait helpers use when called without one.
    #[must_use]
    pub fn default_wait_timeout(&self) -> Option<Duration> {
        self.renderer.options().resolve_timeout(None)
    }

    /// Render `T` as a new root component.
    ///
    /// Errors raised while the component initializes or first renders are
    /// returned here, and the partly built component is disposed.
    pub fn render<T: Component + Default>(&self, params: Parameters) -> Result<RenderedComponent<T>> {
        let spec = ComponentSpec::of::<T>(params);
        let dispatcher = self.dispatcher().clone();
        let state = dispatcher.invoke(move |tree| tree.render_root(&spec))?;
        Ok(RenderedComponent::new(RenderedFragment::new(state, dispatcher)))
    }

    /// Render arbitrary output, typically a component with child content.
    pub fn render_fragment<F>(&self, fragment: F) -> Result<RenderedFragment>
    where
        F: Fn(&mut RenderTreeBuilder) + Send + Sync + 'static,
    {
        let host = self.render::<FragmentHost>(Parameters::new().child_content(fragment))?;
        Ok(host.as_fragment().clone())
    }

    /// Dispose every rendered root component.
    pub fn dispose_components(&self) -> Result<()> {
        self.dispatcher().invoke(|tree| {
            tree.dispose_roots();
            Ok(())
        })
    }
}

/// Root component that renders its child content in place.
#[derive(Default)]
struct FragmentHost {
    content: Option<RenderFragment>,
}

impl Component for FragmentHost {
    fn set_parameters(&mut self, params: &Parameters) -> Result<()> {
        self.content = params.get::<RenderFragment>(CHILD_CONTENT)?;
        Ok(())
    }

    fn render(&self, builder: &mut RenderTreeBuilder) {
        if let Some(content) = &self.content {
            builder.add_fragment(content);
        }
    }
}
