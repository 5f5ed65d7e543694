//! Wait helpers available on every rendered fragment.

use super::{WaitForHelper, WaitOptions, WaitTask};
use crate::component::Component;
use crate::dom::{Selector, select_all};
use crate::element::Element;
use crate::error::Error;
use crate::fragment::{RenderedComponent, RenderedFragment};
use crate::renderer::panic_message;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Anything that can be viewed as a [`RenderedFragment`].
pub trait AsFragment: Clone + Send + Sync + 'static {
    fn as_rendered_fragment(&self) -> &RenderedFragment;
}

impl AsFragment for RenderedFragment {
    fn as_rendered_fragment(&self) -> &RenderedFragment {
        self
    }
}

impl<T: Component> AsFragment for RenderedComponent<T> {
    fn as_rendered_fragment(&self) -> &RenderedFragment {
        self.as_fragment()
    }
}

/// Wait for the rendered output to reach some state.
///
/// Every helper takes an optional timeout; `None` uses the context default.
/// The returned [`WaitTask`] is blocked on with `wait()` or awaited.
///
/// ```no_run
/// use rendertest::prelude::*;
/// # fn demo<C: Component>(cut: RenderedComponent<C>) -> Result<()> {
/// let probe = cut.clone();
/// cut.wait_for_state(move || probe.render_count() > 1, None).wait()?;
///
/// let items = cut.wait_for_elements("li", Some(3), None).wait()?;
/// assert_eq!(items.len(), 3);
/// # Ok(())
/// # }
/// ```
pub trait WaitFor: AsFragment {
    /// Pass once `predicate` returns `true`.
    fn wait_for_state<P>(&self, mut predicate: P, timeout: Option<Duration>) -> WaitTask<()>
    where
        P: FnMut() -> bool + Send + 'static,
    {
        WaitForHelper::start(
            self.as_rendered_fragment(),
            move |_| Ok(predicate().then_some(())),
            WaitOptions::default().with_timeout(timeout).with_messages(
                "The state predicate did not pass before the timeout period passed.",
                "The state predicate raised an error before the state predicate passed.",
            ),
        )
    }

    /// Pass once `assertion` returns without panicking.
    ///
    /// The panic message of the most recent failed attempt is reported if
    /// the wait times out.
    fn wait_for_assertion<A>(&self, mut assertion: A, timeout: Option<Duration>) -> WaitTask<()>
    where
        A: FnMut() + Send + 'static,
    {
        WaitForHelper::start(
            self.as_rendered_fragment(),
            move |_| {
                panic::catch_unwind(AssertUnwindSafe(&mut assertion))
                    .map(Some)
                    .map_err(|payload| Error::AssertionFailed(panic_message(payload.as_ref())))
            },
            WaitOptions::default().with_timeout(timeout).with_messages(
                "The assertion did not pass within the timeout period.",
                "The assertion raised an error before it passed.",
            ),
        )
    }

    /// Pass once `selector` matches an element.
    fn wait_for_element(&self, selector: &str, timeout: Option<Duration>) -> WaitTask<Element> {
        let fragment = self.as_rendered_fragment();
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(e) => return WaitForHelper::resolved(fragment, Err(e)),
        };
        WaitForHelper::start(
            fragment,
            move |fragment| {
                let nodes = fragment.nodes()?;
                let found = !select_all(&nodes, &selector).is_empty();
                Ok(found.then(|| Element::new(fragment.clone(), selector.clone(), 0)))
            },
            WaitOptions::default().with_timeout(timeout).with_messages(
                "The CSS selector did not result in any matching element(s) before the timeout period passed.",
                "The CSS selector raised an error before a matching element was found.",
            ),
        )
    }

    /// Pass once `selector` matches at least one element (`count` is
    /// `None`) or exactly `count` elements.
    ///
    /// With an exact count, a lookup error fails the wait immediately.
    fn wait_for_elements(
        &self,
        selector: &str,
        count: Option<usize>,
        timeout: Option<Duration>,
    ) -> WaitTask<Vec<Element>> {
        let fragment = self.as_rendered_fragment();
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(e) => return WaitForHelper::resolved(fragment, Err(e)),
        };
        let options = match count {
            None => WaitOptions::default().with_messages(
                "The CSS selector did not result in any matching element(s) before the timeout period passed.",
                "The CSS selector raised an error before a matching element was found.",
            ),
            Some(n) => WaitOptions::default().fail_fast().with_messages(
                format!(
                    "The CSS selector did not result in exactly {n} matching element(s) before the timeout period passed."
                ),
                "The CSS selector raised an error while counting matching elements.",
            ),
        };
        WaitForHelper::start(
            fragment,
            move |fragment| {
                let nodes = fragment.nodes()?;
                let found = select_all(&nodes, &selector).len();
                let passed = count.map_or(found > 0, |n| found == n);
                Ok(passed.then(|| {
                    (0..found)
                        .map(|index| Element::new(fragment.clone(), selector.clone(), index))
                        .collect()
                }))
            },
            options.with_timeout(timeout),
        )
    }

    /// Pass once a component of type `C` exists below this fragment.
    fn wait_for_component<C: Component>(
        &self,
        timeout: Option<Duration>,
    ) -> WaitTask<RenderedComponent<C>> {
        WaitForHelper::start(
            self.as_rendered_fragment(),
            |fragment| Ok(fragment.find_components::<C>()?.into_iter().next()),
            WaitOptions::default().with_timeout(timeout).with_messages(
                format!(
                    "No component of type {} was found before the timeout period passed.",
                    std::any::type_name::<C>()
                ),
                "Looking up the component raised an error.",
            ),
        )
    }

    /// Pass once at least one (`count` is `None`) or exactly `count`
    /// components of type `C` exist below this fragment.
    fn wait_for_components<C: Component>(
        &self,
        count: Option<usize>,
        timeout: Option<Duration>,
    ) -> WaitTask<Vec<RenderedComponent<C>>> {
        let name = std::any::type_name::<C>();
        let options = match count {
            None => WaitOptions::default().with_messages(
                format!("No component of type {name} was found before the timeout period passed."),
                "Looking up the components raised an error.",
            ),
            Some(n) => WaitOptions::default().fail_fast().with_messages(
                format!(
                    "Exactly {n} component(s) of type {name} were not found before the timeout period passed."
                ),
                "Looking up the components raised an error.",
            ),
        };
        WaitForHelper::start(
            self.as_rendered_fragment(),
            move |fragment| {
                let found = fragment.find_components::<C>()?;
                let passed = count.map_or(!found.is_empty(), |n| found.len() == n);
                Ok(passed.then_some(found))
            },
            options.with_timeout(timeout),
        )
    }
}

impl<F: AsFragment> WaitFor for F {}

