//! The component tree owned by the dispatch thread.
//!
//! Rendering a component runs its [`Component::render`], reconciles the
//! child component frames against the previous render (reusing instances
//! matched by type and key, disposing the rest), and records the component
//! as rendered. At the end of each dispatch item [`ComponentTree::settle`]
//! drains the render queue, runs after-render hooks, and rebuilds the DOM
//! snapshot of every component that rendered or has a rendered descendant.

use super::dispatcher::{Dispatcher, guarded};
use super::stream::{ChangeFlags, ComponentChange};
use crate::component::{
    Component, ComponentContext, ComponentId, ComponentSpec, ElementFrame, Frame, Parameters,
    RenderTreeBuilder,
};
use crate::dom::{DomNode, ElementNode, EventBinding};
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_log};
use crate::fragment::FragmentState;
use crate::input::Event;
use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) type Instance = Arc<Mutex<Box<dyn Component>>>;

pub(crate) fn lock_instance(instance: &Instance) -> MutexGuard<'_, Box<dyn Component>> {
    instance.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identity of a child component across renders of its parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ChildKey {
    Keyed(TypeId, String),
    /// N-th unkeyed child of this type.
    Positional(TypeId, usize),
}

struct ComponentNode {
    instance: Instance,
    state: Arc<FragmentState>,
    parent: Option<ComponentId>,
    params: Parameters,
    frames: Vec<Frame>,
    children: Vec<(ChildKey, ComponentId)>,
    has_rendered: bool,
}

/// Per-render bookkeeping while walking new frames.
#[derive(Default)]
struct Reconciliation {
    available: HashMap<ChildKey, ComponentId>,
    occurrences: HashMap<TypeId, usize>,
    seen_keys: HashSet<ChildKey>,
    children: Vec<(ChildKey, ComponentId)>,
    created: Vec<ComponentId>,
}

/// All live components of one renderer.
///
/// Only reachable from jobs run by [`Dispatcher::invoke`] and
/// [`Dispatcher::post`].
pub struct ComponentTree {
    dispatcher: Dispatcher,
    nodes: HashMap<ComponentId, ComponentNode>,
    roots: Vec<ComponentId>,
    next_id: u64,
    render_queue: VecDeque<ComponentId>,
    queued: HashSet<ComponentId>,
    rendered: Vec<ComponentId>,
    after_render: Vec<(ComponentId, bool)>,
    changes: BTreeMap<ComponentId, ChangeFlags>,
    errors: Vec<Error>,
    max_passes: usize,
}

impl ComponentTree {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        let max_passes = dispatcher.options().max_render_passes;
        Self {
            dispatcher,
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_id: 0,
            render_queue: VecDeque::new(),
            queued: HashSet::new(),
            rendered: Vec::new(),
            after_render: Vec::new(),
            changes: BTreeMap::new(),
            errors: Vec::new(),
            max_passes,
        }
    }

    /// Number of live components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` is a live component.
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    #[must_use]
    pub fn total_render_count(&self) -> u64 {
        self.dispatcher.total_render_count()
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Create, initialize and render a root component.
    pub(crate) fn add_root(&mut self, spec: &ComponentSpec) -> Result<Arc<FragmentState>> {
        let id = self.instantiate(spec, None)?;
        self.roots.push(id);
        self.state_of(id)
    }

    /// Add a root and settle it. If anything fails before the root has
    /// settled, the root is disposed and the first error returned.
    pub(crate) fn render_root(&mut self, spec: &ComponentSpec) -> Result<Arc<FragmentState>> {
        let state = self.add_root(spec)?;
        let settled = self.settle();
        let mut errors = self.take_errors();
        let failure = match settled {
            Err(e) => Some(e),
            Ok(()) if !errors.is_empty() => Some(errors.remove(0)),
            Ok(()) => None,
        };
        self.errors = errors;
        match failure {
            Some(e) => {
                self.dispose_subtree(state.id());
                Err(e)
            }
            None => Ok(state),
        }
    }

    pub(crate) fn state_of(&self, id: ComponentId) -> Result<Arc<FragmentState>> {
        self.nodes
            .get(&id)
            .map(|node| Arc::clone(&node.state))
            .ok_or(Error::ComponentDisposed(id))
    }

    fn instance_of(&self, id: ComponentId) -> Result<Instance> {
        self.nodes
            .get(&id)
            .map(|node| Arc::clone(&node.instance))
            .ok_or(Error::ComponentDisposed(id))
    }

    fn instantiate(&mut self, spec: &ComponentSpec, parent: Option<ComponentId>) -> Result<ComponentId> {
        self.next_id += 1;
        let id = ComponentId::new(self.next_id);
        let instance: Instance = Arc::new(Mutex::new((spec.factory)()));
        let state = Arc::new(FragmentState::new(
            id,
            spec.type_id,
            spec.type_name,
            Arc::clone(&instance),
        ));
        self.nodes.insert(
            id,
            ComponentNode {
                instance,
                state,
                parent,
                params: spec.params.clone(),
                frames: Vec::new(),
                children: Vec::new(),
                has_rendered: false,
            },
        );

        let result = self
            .initialize(id, &spec.params)
            .and_then(|()| self.render_component(id, true));
        if let Err(e) = result {
            self.dispose_subtree(id);
            return Err(e);
        }
        Ok(id)
    }

    fn initialize(&self, id: ComponentId, params: &Parameters) -> Result<()> {
        let instance = self.instance_of(id)?;
        guarded(|| {
            let mut component = lock_instance(&instance);
            component.set_parameters(params)?;
            let mut ctx = ComponentContext::new(id, &self.dispatcher);
            component.on_initialized(&mut ctx)?;
            component.on_parameters_set(&mut ctx)
        })
    }

    /// Render `id` now. `force` skips `should_render`.
    fn render_component(&mut self, id: ComponentId, force: bool) -> Result<()> {
        let instance = self.instance_of(id)?;
        self.queued.remove(&id);
        let frames = guarded(|| {
            let component = lock_instance(&instance);
            if !force && !component.should_render() {
                return Ok(None);
            }
            let mut builder = RenderTreeBuilder::new();
            component.render(&mut builder);
            Ok(Some(builder.finish()))
        })?;
        let Some(frames) = frames else {
            return Ok(());
        };

        self.dispatcher.record_render();
        self.rendered.push(id);
        let first_render = self
            .nodes
            .get_mut(&id)
            .is_some_and(|node| !std::mem::replace(&mut node.has_rendered, true));
        self.reconcile(id, frames)?;
        self.after_render.push((id, first_render));
        Ok(())
    }

    fn reconcile(&mut self, id: ComponentId, mut frames: Vec<Frame>) -> Result<()> {
        let previous = self
            .nodes
            .get(&id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        let mut pass = Reconciliation {
            available: previous.iter().cloned().collect(),
            ..Reconciliation::default()
        };

        if let Err(e) = self.reconcile_frames(id, &mut frames, &mut pass) {
            for created in pass.created {
                self.dispose_subtree(created);
            }
            return Err(e);
        }

        for (_, removed) in pass.available {
            self.dispose_subtree(removed);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.frames = frames;
            node.children = pass.children;
        }
        Ok(())
    }

    fn reconcile_frames(
        &mut self,
        parent: ComponentId,
        frames: &mut [Frame],
        pass: &mut Reconciliation,
    ) -> Result<()> {
        for frame in frames {
            match frame {
                Frame::Element(element) => {
                    self.reconcile_frames(parent, &mut element.children, pass)?;
                }
                Frame::Component(child) => {
                    let key = Self::child_key(&child.spec, child.key.as_deref(), pass);
                    let child_id = match pass.available.remove(&key) {
                        Some(existing) => {
                            self.update_child(existing, &child.spec.params)?;
                            existing
                        }
                        None => {
                            let created = self.instantiate(&child.spec, Some(parent))?;
                            pass.created.push(created);
                            created
                        }
                    };
                    child.id = Some(child_id);
                    pass.children.push((key, child_id));
                }
                Frame::Text(_) | Frame::Markup(_) => {}
            }
        }
        Ok(())
    }

    fn child_key(spec: &ComponentSpec, key: Option<&str>, pass: &mut Reconciliation) -> ChildKey {
        if let Some(key) = key {
            let keyed = ChildKey::Keyed(spec.type_id, key.to_string());
            if pass.seen_keys.insert(keyed.clone()) {
                return keyed;
            }
            emit_log(
                LogLevel::Warn,
                &format!(
                    "duplicate key '{key}' for {}; matching by position",
                    spec.type_name
                ),
            );
        }
        let occurrence = pass.occurrences.entry(spec.type_id).or_insert(0);
        *occurrence += 1;
        ChildKey::Positional(spec.type_id, *occurrence - 1)
    }

    /// Pass new parameters to an existing child; re-render if they changed.
    fn update_child(&mut self, id: ComponentId, params: &Parameters) -> Result<()> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Err(Error::ComponentDisposed(id));
        };
        if node.params == *params {
            return Ok(());
        }
        node.params = params.clone();
        self.apply_parameters(id, params)?;
        self.render_component(id, false)
    }

    fn apply_parameters(&self, id: ComponentId, params: &Parameters) -> Result<()> {
        let instance = self.instance_of(id)?;
        guarded(|| {
            let mut component = lock_instance(&instance);
            component.set_parameters(params)?;
            let mut ctx = ComponentContext::new(id, &self.dispatcher);
            component.on_parameters_set(&mut ctx)
        })
    }

    /// Merge `params` into the component's parameters and re-render it.
    pub(crate) fn set_parameters_and_render(
        &mut self,
        id: ComponentId,
        params: &Parameters,
    ) -> Result<()> {
        let Some(node) = self.nodes.get_mut(&id) else {
            return Err(Error::ComponentDisposed(id));
        };
        node.params.merge(params);
        let merged = node.params.clone();
        self.apply_parameters(id, &merged)?;
        self.request_render(id);
        Ok(())
    }

    /// Queue `id` for rendering before the current item completes.
    pub fn request_render(&mut self, id: ComponentId) {
        if self.nodes.contains_key(&id) && self.queued.insert(id) {
            self.render_queue.push_back(id);
        }
    }

    /// Run `f` against component `id` as a `T`.
    ///
    /// Returns `Ok(None)` if the component has been disposed.
    pub(crate) fn with_instance_mut<T, R, F>(&mut self, id: ComponentId, f: F) -> Result<Option<R>>
    where
        T: Component,
        F: FnOnce(&mut T, &mut ComponentContext<'_>) -> Result<R>,
    {
        let Some(instance) = self.nodes.get(&id).map(|node| Arc::clone(&node.instance)) else {
            return Ok(None);
        };
        let (value, requested) = guarded(|| {
            let mut guard = lock_instance(&instance);
            let Some(component) = (**guard).as_any_mut().downcast_mut::<T>() else {
                return Err(Error::ComponentNotFound {
                    type_name: type_name::<T>(),
                });
            };
            let mut ctx = ComponentContext::new(id, &self.dispatcher);
            let value = f(component, &mut ctx)?;
            Ok((value, ctx.render_requested()))
        })?;
        if requested {
            self.request_render(id);
        }
        Ok(Some(value))
    }

    /// Deliver `event` to the component that bound it, then re-render it.
    pub(crate) fn dispatch_event(&mut self, binding: &EventBinding, event: &Event) -> Result<()> {
        let id = binding.component;
        let instance = self.instance_of(id)?;
        guarded(|| {
            let mut component = lock_instance(&instance);
            let mut ctx = ComponentContext::new(id, &self.dispatcher);
            component.handle_event(&binding.handler, event, &mut ctx)
        })?;
        self.request_render(id);
        Ok(())
    }

    pub(crate) fn report_error(&mut self, error: Error) {
        self.errors.push(error);
    }

    pub(crate) fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    pub(crate) fn take_changes(&mut self) -> Vec<ComponentChange> {
        std::mem::take(&mut self.changes)
            .into_iter()
            .map(|(component, flags)| ComponentChange { component, flags })
            .collect()
    }

    /// Render until nothing is queued, then refresh snapshots.
    pub(crate) fn settle(&mut self) -> Result<()> {
        let result = self.drain();
        self.refresh_snapshots();
        result
    }

    fn drain(&mut self) -> Result<()> {
        let mut passes = 0;
        loop {
            while let Some(id) = self.render_queue.pop_front() {
                if !self.queued.contains(&id) || !self.nodes.contains_key(&id) {
                    continue;
                }
                passes += 1;
                if passes > self.max_passes {
                    self.render_queue.clear();
                    self.queued.clear();
                    self.after_render.clear();
                    emit_log(
                        LogLevel::Error,
                        &format!("render loop aborted after {} passes", self.max_passes),
                    );
                    return Err(Error::RenderLoop {
                        passes: self.max_passes,
                    });
                }
                if let Err(e) = self.render_component(id, false) {
                    self.report_error(e);
                }
            }

            if self.after_render.is_empty() {
                return Ok(());
            }
            for (id, first_render) in std::mem::take(&mut self.after_render) {
                if let Err(e) = self.after_render_hook(id, first_render) {
                    self.report_error(e);
                }
            }
        }
    }

    fn after_render_hook(&mut self, id: ComponentId, first_render: bool) -> Result<()> {
        let Ok(instance) = self.instance_of(id) else {
            return Ok(());
        };
        let requested = guarded(|| {
            let mut component = lock_instance(&instance);
            let mut ctx = ComponentContext::new(id, &self.dispatcher);
            component.on_after_render(first_render, &mut ctx)?;
            Ok(ctx.render_requested())
        })?;
        if requested {
            self.request_render(id);
        }
        Ok(())
    }

    /// Rebuild the snapshot of every component that rendered this item and of
    /// its ancestors. Each affected fragment's render count grows by one.
    fn refresh_snapshots(&mut self) {
        let mut affected: BTreeMap<ComponentId, ChangeFlags> = BTreeMap::new();
        for id in std::mem::take(&mut self.rendered) {
            if !self.nodes.contains_key(&id) {
                continue;
            }
            *affected.entry(id).or_default() |= ChangeFlags::RENDERED;
            let mut parent = self.nodes.get(&id).and_then(|node| node.parent);
            while let Some(ancestor) = parent {
                *affected.entry(ancestor).or_default() |= ChangeFlags::SUBTREE_RENDERED;
                parent = self.nodes.get(&ancestor).and_then(|node| node.parent);
            }
        }

        let mut cache: HashMap<ComponentId, Arc<Vec<DomNode>>> = HashMap::new();
        for (&id, &flags) in &affected {
            let nodes = self.expand(id, &affected, &mut cache);
            let mut descendants = Vec::new();
            self.collect_descendants(id, &mut descendants);
            if let Some(node) = self.nodes.get(&id) {
                node.state.update(nodes, descendants);
            }
            *self.changes.entry(id).or_default() |= flags;
        }
    }

    fn expand(
        &self,
        id: ComponentId,
        affected: &BTreeMap<ComponentId, ChangeFlags>,
        cache: &mut HashMap<ComponentId, Arc<Vec<DomNode>>>,
    ) -> Arc<Vec<DomNode>> {
        if let Some(nodes) = cache.get(&id) {
            return Arc::clone(nodes);
        }
        let Some(node) = self.nodes.get(&id) else {
            return Arc::default();
        };
        if !affected.contains_key(&id) {
            return node.state.nodes();
        }
        let mut out = Vec::new();
        self.frames_to_dom(id, &node.frames, affected, cache, &mut out);
        let nodes = Arc::new(out);
        cache.insert(id, Arc::clone(&nodes));
        nodes
    }

    fn frames_to_dom(
        &self,
        owner: ComponentId,
        frames: &[Frame],
        affected: &BTreeMap<ComponentId, ChangeFlags>,
        cache: &mut HashMap<ComponentId, Arc<Vec<DomNode>>>,
        out: &mut Vec<DomNode>,
    ) {
        for frame in frames {
            match frame {
                Frame::Element(element) => {
                    out.push(DomNode::Element(
                        self.element_to_dom(owner, element, affected, cache),
                    ));
                }
                Frame::Text(text) => out.push(DomNode::Text(text.clone())),
                Frame::Markup(markup) => out.push(DomNode::Markup(markup.clone())),
                Frame::Component(child) => {
                    if let Some(child_id) = child.id {
                        out.extend(self.expand(child_id, affected, cache).iter().cloned());
                    }
                }
            }
        }
    }

    fn element_to_dom(
        &self,
        owner: ComponentId,
        element: &ElementFrame,
        affected: &BTreeMap<ComponentId, ChangeFlags>,
        cache: &mut HashMap<ComponentId, Arc<Vec<DomNode>>>,
    ) -> ElementNode {
        let mut children = Vec::new();
        self.frames_to_dom(owner, &element.children, affected, cache, &mut children);
        ElementNode {
            tag: element.tag.clone(),
            attributes: element.attributes.clone(),
            handlers: element
                .handlers
                .iter()
                .map(|(event, handler)| EventBinding {
                    event: event.clone(),
                    component: owner,
                    handler: handler.clone(),
                })
                .collect(),
            children,
        }
    }

    fn collect_descendants(&self, id: ComponentId, out: &mut Vec<Arc<FragmentState>>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for (_, child) in &node.children {
            if let Some(child_node) = self.nodes.get(child) {
                out.push(Arc::clone(&child_node.state));
                self.collect_descendants(*child, out);
            }
        }
    }

    /// Dispose `id` and everything below it. Children go first.
    pub(crate) fn dispose_subtree(&mut self, id: ComponentId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        for (_, child) in &node.children {
            self.dispose_subtree(*child);
        }
        if let Err(e) = guarded(|| {
            lock_instance(&node.instance).dispose();
            Ok(())
        }) {
            self.report_error(e);
        }
        node.state.mark_disposed();
        self.queued.remove(&id);
        self.roots.retain(|root| *root != id);
        *self.changes.entry(id).or_default() |= ChangeFlags::DISPOSED;
    }

    /// Dispose every root component.
    pub(crate) fn dispose_roots(&mut self) {
        for root in std::mem::take(&mut self.roots) {
            self.dispose_subtree(root);
        }
    }
}

impl std::fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTree")
            .field("components", &self.nodes.len())
            .field("roots", &self.roots)
            .field("queued", &self.render_queue.len())
            .finish_non_exhaustive()
    }
}
