//! Handles to rendered subtrees.
//!
//! A [`RenderedFragment`] reads the snapshot that the dispatch thread
//! publishes for its component after every dispatch item in which the
//! component, or one of its descendants, rendered. Reading never blocks on
//! the dispatcher, only on the snapshot lock.

use crate::component::{Component, ComponentContext, ComponentHandle, ComponentId, Parameters};
use crate::dom::{self, DomNode, Selector};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::renderer::Dispatcher;
use crate::renderer::tree::{Instance, lock_instance};
use std::any::{TypeId, type_name};
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Default)]
struct Snapshot {
    markup: Arc<str>,
    nodes: Arc<Vec<DomNode>>,
    render_count: u64,
    disposed: bool,
    /// Descendant components in document order.
    descendants: Arc<Vec<Arc<FragmentState>>>,
}

/// Shared between a component's tree node and its fragment handles.
pub(crate) struct FragmentState {
    id: ComponentId,
    type_id: TypeId,
    type_name: &'static str,
    instance: Instance,
    snapshot: Mutex<Snapshot>,
}

impl FragmentState {
    pub(crate) fn new(
        id: ComponentId,
        type_id: TypeId,
        type_name: &'static str,
        instance: Instance,
    ) -> Self {
        Self {
            id,
            type_id,
            type_name,
            instance,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    pub(crate) fn id(&self) -> ComponentId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Publish new output and count one render.
    pub(crate) fn update(&self, nodes: Arc<Vec<DomNode>>, descendants: Vec<Arc<Self>>) {
        let markup: Arc<str> = dom::to_markup(&nodes).into();
        let mut snapshot = self.lock();
        snapshot.markup = markup;
        snapshot.nodes = nodes;
        snapshot.descendants = Arc::new(descendants);
        snapshot.render_count += 1;
    }

    pub(crate) fn mark_disposed(&self) {
        let mut snapshot = self.lock();
        snapshot.disposed = true;
        snapshot.descendants = Arc::default();
    }

    pub(crate) fn nodes(&self) -> Arc<Vec<DomNode>> {
        Arc::clone(&self.lock().nodes)
    }
}

/// A rendered component and everything it rendered below it.
#[derive(Clone)]
pub struct RenderedFragment {
    state: Arc<FragmentState>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for RenderedFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.state.read();
        f.debug_struct("RenderedFragment")
            .field("component", &self.state.id)
            .field("type", &self.state.type_name)
            .field("render_count", &snapshot.render_count)
            .field("disposed", &snapshot.disposed)
            .finish()
    }
}

impl RenderedFragment {
    pub(crate) fn new(state: Arc<FragmentState>, dispatcher: Dispatcher) -> Self {
        Self { state, dispatcher }
    }

    #[must_use]
    pub fn component_id(&self) -> ComponentId {
        self.state.id
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.state.type_name
    }

    /// Dispatch items in which this component or a descendant rendered.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.state.lock().render_count
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn live(&self) -> Result<Snapshot> {
        let snapshot = self.state.read();
        if snapshot.disposed {
            return Err(Error::ComponentDisposed(self.state.id));
        }
        Ok(snapshot)
    }

    /// The latest markup.
    pub fn markup(&self) -> Result<String> {
        Ok(self.live()?.markup.to_string())
    }

    /// The latest output as DOM nodes.
    pub fn nodes(&self) -> Result<Arc<Vec<DomNode>>> {
        Ok(self.live()?.nodes)
    }

    pub fn text_content(&self) -> Result<String> {
        Ok(self.live()?.nodes.iter().map(DomNode::text_content).collect())
    }

    /// The first element matching `selector`.
    pub fn find(&self, selector: &str) -> Result<Element> {
        let selector = Selector::parse(selector)?;
        let nodes = self.nodes()?;
        if dom::select_all(&nodes, &selector).is_empty() {
            return Err(Error::ElementNotFound {
                selector: selector.as_str().to_string(),
            });
        }
        Ok(Element::new(self.clone(), selector, 0))
    }

    /// Every element matching `selector`, possibly none.
    pub fn find_all(&self, selector: &str) -> Result<Vec<Element>> {
        let selector = Selector::parse(selector)?;
        let nodes = self.nodes()?;
        let count = dom::select_all(&nodes, &selector).len();
        Ok((0..count)
            .map(|index| Element::new(self.clone(), selector.clone(), index))
            .collect())
    }

    /// The first descendant component of type `C`.
    pub fn find_component<C: Component>(&self) -> Result<RenderedComponent<C>> {
        self.find_components::<C>()?
            .into_iter()
            .next()
            .ok_or(Error::ComponentNotFound {
                type_name: type_name::<C>(),
            })
    }

    /// Every descendant component of type `C`, in document order.
    pub fn find_components<C: Component>(&self) -> Result<Vec<RenderedComponent<C>>> {
        let snapshot = self.live()?;
        Ok(snapshot
            .descendants
            .iter()
            .filter(|state| state.type_id == TypeId::of::<C>())
            .map(|state| {
                RenderedComponent::new(RenderedFragment::new(
                    Arc::clone(state),
                    self.dispatcher.clone(),
                ))
            })
            .collect())
    }
}

/// A rendered fragment whose root component is a `T`.
pub struct RenderedComponent<T> {
    fragment: RenderedFragment,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for RenderedComponent<T> {
    fn clone(&self) -> Self {
        Self {
            fragment: self.fragment.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RenderedComponent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.fragment, f)
    }
}

impl<T> Deref for RenderedComponent<T> {
    type Target = RenderedFragment;

    fn deref(&self) -> &RenderedFragment {
        &self.fragment
    }
}

impl<T: Component> RenderedComponent<T> {
    pub(crate) fn new(fragment: RenderedFragment) -> Self {
        Self {
            fragment,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn as_fragment(&self) -> &RenderedFragment {
        &self.fragment
    }

    /// Read the component instance.
    ///
    /// Waits for the dispatch thread to release the instance if it is in a
    /// lifecycle call.
    pub fn instance<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let state = &self.fragment.state;
        if self.fragment.is_disposed() {
            return Err(Error::ComponentDisposed(state.id));
        }
        let guard = lock_instance(&state.instance);
        (**guard)
            .as_any()
            .downcast_ref::<T>()
            .map(f)
            .ok_or(Error::ComponentNotFound {
                type_name: type_name::<T>(),
            })
    }

    /// Run `f` against the instance on the dispatch thread and wait for the
    /// renders it requests.
    pub fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T, &mut ComponentContext<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let id = self.component_id();
        self.fragment.dispatcher.invoke(move |tree| {
            tree.with_instance_mut::<T, _, _>(id, f)?
                .ok_or(Error::ComponentDisposed(id))
        })
    }

    /// Merge `params` into the current parameters and re-render.
    pub fn set_parameters_and_render(&self, params: Parameters) -> Result<()> {
        let id = self.component_id();
        self.fragment
            .dispatcher
            .invoke(move |tree| tree.set_parameters_and_render(id, &params))
    }

    /// Re-render with the current parameters.
    pub fn render(&self) -> Result<()> {
        self.set_parameters_and_render(Parameters::new())
    }

    #[must_use]
    pub fn handle(&self) -> ComponentHandle<T> {
        ComponentHandle::new(self.component_id(), self.fragment.dispatcher.clone())
    }
}
