//! Render event stream and dispatch observers.

use crate::component::ComponentId;
use crate::error::Error;
use bitflags::bitflags;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

bitflags! {
    /// What happened to a component during one dispatch item.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u8 {
        /// The component itself rendered.
        const RENDERED = 0b0000_0001;
        /// A descendant component rendered.
        const SUBTREE_RENDERED = 0b0000_0010;
        /// The component was disposed.
        const DISPOSED = 0b0000_0100;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentChange {
    pub component: ComponentId,
    pub flags: ChangeFlags,
}

/// Changes produced by one completed dispatch item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderEvent {
    /// 1-based index of the completed item.
    pub sequence: u64,
    pub changes: Vec<ComponentChange>,
}

impl RenderEvent {
    /// Flags recorded for `component`, empty if it was untouched.
    #[must_use]
    pub fn flags_for(&self, component: ComponentId) -> ChangeFlags {
        self.changes
            .iter()
            .filter(|change| change.component == component)
            .fold(ChangeFlags::empty(), |acc, change| acc | change.flags)
    }

    /// Whether `component` or anything below it changed.
    #[must_use]
    pub fn has_changes_to(&self, component: ComponentId) -> bool {
        !self.flags_for(component).is_empty()
    }

    #[must_use]
    pub fn did_render(&self, component: ComponentId) -> bool {
        self.flags_for(component).contains(ChangeFlags::RENDERED)
    }

    #[must_use]
    pub fn was_disposed(&self, component: ComponentId) -> bool {
        self.flags_for(component).contains(ChangeFlags::DISPOSED)
    }
}

/// Receives dispatch completions on the dispatch thread.
pub(crate) trait DispatchObserver: Send + Sync {
    fn on_dispatch_completed(&self, event: &RenderEvent);

    /// Offer an error raised by a posted job. Return `None` to accept it.
    fn on_dispatch_error(&self, error: Error) -> Option<Error> {
        Some(error)
    }

    fn on_renderer_disposed(&self);

    /// Inactive observers are pruned after the next notification.
    fn is_active(&self) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SubscriptionId(u64);

#[derive(Default)]
struct ObserverState {
    next_id: u64,
    closed: bool,
    entries: Vec<(SubscriptionId, Arc<dyn DispatchObserver>)>,
}

/// Subscribers in subscription order.
#[derive(Default)]
pub(crate) struct ObserverList {
    state: Mutex<ObserverState>,
}

impl ObserverList {
    /// Returns `None` once the renderer has been disposed.
    pub(crate) fn subscribe(&self, observer: Arc<dyn DispatchObserver>) -> Option<SubscriptionId> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.entries.push((id, observer));
        Some(id)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().entries.retain(|(entry, _)| *entry != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn snapshot(&self) -> Vec<(SubscriptionId, Arc<dyn DispatchObserver>)> {
        self.lock().entries.clone()
    }

    /// Call every observer with no lock held, then drop inactive ones.
    ///
    /// Observers take their own locks in `is_active`, so the list lock is
    /// never held while calling into them.
    pub(crate) fn notify(&self, event: &RenderEvent) {
        let observers = self.snapshot();
        for (_, observer) in &observers {
            observer.on_dispatch_completed(event);
        }
        let inactive: Vec<SubscriptionId> = observers
            .iter()
            .filter(|(_, observer)| !observer.is_active())
            .map(|(id, _)| *id)
            .collect();
        if !inactive.is_empty() {
            self.lock()
                .entries
                .retain(|(id, _)| !inactive.contains(id));
        }
    }

    /// Hand `error` to the first observer that accepts it.
    pub(crate) fn offer_error(&self, error: Error) -> Option<Error> {
        let mut error = error;
        for (_, observer) in self.snapshot() {
            if !observer.is_active() {
                continue;
            }
            match observer.on_dispatch_error(error) {
                Some(declined) => error = declined,
                None => return None,
            }
        }
        Some(error)
    }

    /// Refuse further subscriptions and tell everyone the renderer is gone.
    pub(crate) fn close(&self) {
        let entries = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        for (_, observer) in entries {
            observer.on_renderer_disposed();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Forwards render events into a channel until the receiver is dropped.
pub(crate) struct ChannelObserver {
    tx: Mutex<Sender<RenderEvent>>,
    active: AtomicBool,
}

impl ChannelObserver {
    pub(crate) fn new() -> (Arc<Self>, Receiver<RenderEvent>) {
        let (tx, rx) = mpsc::channel();
        let observer = Arc::new(Self {
            tx: Mutex::new(tx),
            active: AtomicBool::new(true),
        });
        (observer, rx)
    }
}

impl DispatchObserver for ChannelObserver {
    fn on_dispatch_completed(&self, event: &RenderEvent) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if tx.send(event.clone()).is_err() {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    fn on_renderer_disposed(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
