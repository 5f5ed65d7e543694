//! Serializes render work onto the dispatch thread.
//!
//! ```text
//! Test thread                         Dispatch thread
//! -----------                         ---------------
//! invoke(f)  ── Work { job, reply } ─▶ run job
//!   (blocked)                          settle render queue
//!                                      refresh snapshots
//!                                      route errors, notify observers
//! result     ◀──────── reply ───────── next item
//! ```

use super::stream::{ComponentChange, DispatchObserver, ObserverList, RenderEvent, SubscriptionId};
use super::tree::ComponentTree;
use crate::config::TestContextOptions;
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_log};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::task::{Context, Poll, Waker};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// A unit of work run against the component tree.
pub(crate) type Job = Box<dyn FnOnce(&mut ComponentTree) -> Result<()> + Send>;

pub(crate) enum Command {
    /// Run a job. `reply` is set for blocking invocations.
    Work {
        job: Job,
        reply: Option<Sender<Result<()>>>,
    },
    /// Dispose every component and stop the dispatch thread.
    Shutdown,
}

/// State shared between the dispatch thread and every handle.
pub(crate) struct Shared {
    observers: ObserverList,
    unhandled: ErrorSlot,
    total_renders: AtomicU64,
    completed_items: AtomicU64,
    disposed: AtomicBool,
    /// Held shared while sending, exclusively while shutting down, so no
    /// work can be queued behind the shutdown command.
    send_gate: RwLock<()>,
    dispatch_thread: OnceLock<ThreadId>,
    options: TestContextOptions,
}

impl Shared {
    fn new(options: TestContextOptions) -> Self {
        Self {
            observers: ObserverList::default(),
            unhandled: ErrorSlot::default(),
            total_renders: AtomicU64::new(0),
            completed_items: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            send_gate: RwLock::new(()),
            dispatch_thread: OnceLock::new(),
            options,
        }
    }

    fn complete_item(&self, changes: Vec<ComponentChange>, errors: Vec<Error>) {
        let sequence = self.completed_items.fetch_add(1, Ordering::SeqCst) + 1;
        for error in errors {
            self.route_error(error);
        }
        self.observers.notify(&RenderEvent { sequence, changes });
    }

    /// Deliver an error to exactly one place: a pending waiter or the
    /// unhandled-error slot.
    fn route_error(&self, error: Error) {
        if let Some(unaccepted) = self.observers.offer_error(error) {
            emit_log(
                LogLevel::Warn,
                &format!("unhandled error in dispatched work: {unaccepted}"),
            );
            self.unhandled.set(unaccepted);
        }
    }
}

/// Handle for queueing work onto a renderer's dispatch thread.
///
/// Every render-affecting operation goes through a dispatcher, so work from
/// any thread is applied in strict FIFO order and observed consistently.
#[derive(Clone)]
pub struct Dispatcher {
    tx: Sender<Command>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("completed_items", &self.completed_items())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub(crate) fn channel(options: TestContextOptions) -> (Self, Receiver<Command>) {
        let (tx, rx) = mpsc::channel();
        let dispatcher = Self {
            tx,
            shared: Arc::new(Shared::new(options)),
        };
        (dispatcher, rx)
    }

    /// Run `f` on the dispatch thread and block until the item completes.
    ///
    /// The reply arrives after renders caused by `f` have settled and every
    /// observer has been notified, so fragment snapshots read afterwards
    /// reflect the change. Called from the dispatch thread itself this
    /// returns [`Error::ReentrantDispatch`].
    pub fn invoke<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ComponentTree) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_dispatch_thread() {
            return Err(Error::ReentrantDispatch);
        }
        let (value_tx, value_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Command::Work {
            job: Box::new(move |tree| {
                let value = f(tree)?;
                let _ = value_tx.send(value);
                Ok(())
            }),
            reply: Some(reply_tx),
        })?;

        match reply_rx.recv() {
            Ok(Ok(())) => value_rx.recv().map_err(|_| Error::RendererDisposed),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::RendererDisposed),
        }
    }

    /// Queue `f` without waiting for it.
    ///
    /// Errors raised by `f`, or by the renders it causes, are offered to
    /// pending wait helpers in subscription order and otherwise stored as
    /// the renderer's unhandled error.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ComponentTree) -> Result<()> + Send + 'static,
    {
        self.send(Command::Work {
            job: Box::new(f),
            reply: None,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        let _gate = self
            .shared
            .send_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_disposed() {
            return Err(Error::RendererDisposed);
        }
        self.tx.send(command).map_err(|_| Error::RendererDisposed)
    }

    pub(crate) fn shutdown(&self) {
        let _gate = self
            .shared
            .send_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.shared.disposed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Command::Shutdown);
        }
    }

    #[must_use]
    pub fn is_dispatch_thread(&self) -> bool {
        self.shared.dispatch_thread.get() == Some(&thread::current().id())
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Number of dispatch items completed so far.
    #[must_use]
    pub fn completed_items(&self) -> u64 {
        self.shared.completed_items.load(Ordering::SeqCst)
    }

    /// Component renders performed by this renderer.
    #[must_use]
    pub fn total_render_count(&self) -> u64 {
        self.shared.total_renders.load(Ordering::SeqCst)
    }

    /// Number of active dispatch observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.shared.observers.len()
    }

    pub(crate) fn subscribe(&self, observer: Arc<dyn DispatchObserver>) -> Option<SubscriptionId> {
        self.shared.observers.subscribe(observer)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.observers.unsubscribe(id);
    }

    pub(crate) fn record_render(&self) {
        self.shared.total_renders.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn options(&self) -> &TestContextOptions {
        &self.shared.options
    }

    pub(crate) fn set_dispatch_thread(&self, id: ThreadId) {
        let _ = self.shared.dispatch_thread.set(id);
    }

    pub(crate) fn unhandled(&self) -> &ErrorSlot {
        &self.shared.unhandled
    }
}

/// Dispatch thread body.
pub(crate) fn run(rx: Receiver<Command>, dispatcher: Dispatcher) {
    let shared = Arc::clone(&dispatcher.shared);
    dispatcher.set_dispatch_thread(thread::current().id());
    let mut tree = ComponentTree::new(dispatcher);
    emit_log(LogLevel::Debug, "dispatch thread started");

    while let Ok(command) = rx.recv() {
        match command {
            Command::Work { job, reply } => process(&mut tree, &shared, job, reply),
            Command::Shutdown => break,
        }
    }

    shared.disposed.store(true, Ordering::SeqCst);
    reject_pending(&rx, &shared);
    drop(rx);

    if let Err(e) = guarded(|| {
        tree.dispose_roots();
        Ok(())
    }) {
        tree.report_error(e);
    }
    for error in tree.take_errors() {
        emit_log(LogLevel::Error, &format!("disposing components failed: {error}"));
        shared.unhandled.set(error);
    }
    shared.observers.close();
    shared.unhandled.close();
    emit_log(LogLevel::Debug, "dispatch thread stopped");
}

/// Fail work that is still queued once the loop has stopped.
fn reject_pending(rx: &Receiver<Command>, shared: &Shared) {
    while let Ok(command) = rx.try_recv() {
        let Command::Work { reply, .. } = command else {
            continue;
        };
        match reply {
            Some(reply) => {
                let _ = reply.send(Err(Error::RendererDisposed));
            }
            None => {
                emit_log(LogLevel::Warn, "posted work discarded at shutdown");
                shared.unhandled.set(Error::RendererDisposed);
            }
        }
    }
}

fn process(
    tree: &mut ComponentTree,
    shared: &Shared,
    job: Job,
    reply: Option<Sender<Result<()>>>,
) {
    let outcome = guarded(|| job(tree));
    if let Err(e) = guarded(|| tree.settle()) {
        tree.report_error(e);
    }
    let mut errors = tree.take_errors();

    let outcome = match (&reply, outcome) {
        (Some(_), Ok(())) if !errors.is_empty() => Err(errors.remove(0)),
        (Some(_), outcome) => outcome,
        (None, Err(e)) => {
            errors.insert(0, e);
            Ok(())
        }
        (None, Ok(())) => Ok(()),
    };

    shared.complete_item(tree.take_changes(), errors);

    if let Some(reply) = reply {
        if let Err(SendError(Err(e))) = reply.send(outcome) {
            shared.route_error(e);
        }
    }
}

/// Run `f`, converting a panic into [`Error::Panicked`].
pub(crate) fn guarded<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))))
}

pub(crate) fn panic_message(payload: &dyn std::any::Any) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "dispatched work panicked".to_string())
}

#[derive(Default)]
struct SlotState {
    error: Option<Error>,
    closed: bool,
    wakers: Vec<Waker>,
}

/// Holds the most recent error nobody accepted. Last write wins.
#[derive(Default)]
pub(crate) struct ErrorSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl ErrorSlot {
    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, error: Error) {
        let wakers = {
            let mut state = self.lock();
            state.error = Some(error);
            std::mem::take(&mut state.wakers)
        };
        self.ready.notify_all();
        wakers.into_iter().for_each(Waker::wake);
    }

    fn close(&self) {
        let wakers = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.wakers)
        };
        self.ready.notify_all();
        wakers.into_iter().for_each(Waker::wake);
    }

    pub(crate) fn take(&self) -> Option<Error> {
        self.lock().error.take()
    }

    /// Block until an error arrives, the renderer is disposed, or `timeout`
    /// elapses. `None` waits without a deadline.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Option<Error> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.lock();
        loop {
            if let Some(error) = state.error.take() {
                return Some(error);
            }
            if state.closed {
                return None;
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    fn poll_error(&self, cx: &Context<'_>) -> Poll<Option<Error>> {
        let mut state = self.lock();
        if let Some(error) = state.error.take() {
            return Poll::Ready(Some(error));
        }
        if state.closed {
            return Poll::Ready(None);
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Resolves with the next unhandled error, or `None` once the renderer is
/// disposed without one.
#[must_use = "futures do nothing unless polled"]
pub struct UnhandledError {
    dispatcher: Dispatcher,
}

impl UnhandledError {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl Future for UnhandledError {
    type Output = Option<Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.dispatcher.unhandled().poll_error(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_slot_last_write_wins() {
        let slot = ErrorSlot::default();
        slot.set(Error::WaitCanceled);
        slot.set(Error::RendererDisposed);
        assert!(matches!(slot.take(), Some(Error::RendererDisposed)));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_error_slot_wait_times_out() {
        let slot = ErrorSlot::default();
        let start = Instant::now();
        assert!(slot.wait(Some(Duration::from_millis(20))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_error_slot_wait_wakes_on_set() {
        let slot = Arc::new(ErrorSlot::default());
        let setter = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set(Error::WaitCanceled);
        });
        assert!(matches!(slot.wait(None), Some(Error::WaitCanceled)));
        handle.join().unwrap();
    }

    #[test]
    fn test_error_slot_close_releases_waiters() {
        let slot = ErrorSlot::default();
        slot.close();
        assert!(slot.wait(None).is_none());
    }

    #[test]
    fn test_reject_pending_fails_leftover_work() {
        let (dispatcher, rx) = Dispatcher::channel(TestContextOptions::default());
        let (reply_tx, reply_rx) = mpsc::channel();
        for reply in [Some(reply_tx), None] {
            dispatcher
                .tx
                .send(Command::Work {
                    job: Box::new(|_| Ok(())),
                    reply,
                })
                .unwrap();
        }

        reject_pending(&rx, &dispatcher.shared);

        assert!(matches!(reply_rx.recv().unwrap(), Err(Error::RendererDisposed)));
        assert!(matches!(dispatcher.unhandled().take(), Some(Error::RendererDisposed)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_is_sent_once() {
        let (dispatcher, rx) = Dispatcher::channel(TestContextOptions::default());
        dispatcher.shutdown();
        dispatcher.shutdown();
        assert!(dispatcher.is_disposed());
        assert!(matches!(rx.try_recv(), Ok(Command::Shutdown)));
        assert!(rx.try_recv().is_err());
        assert!(matches!(dispatcher.post(|_| Ok(())), Err(Error::RendererDisposed)));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "dispatched work panicked");
    }

    #[test]
    fn test_guarded_converts_panics() {
        let result: Result<()> = guarded(|| panic!("bad render"));
        assert!(matches!(result, Err(Error::Panicked(msg)) if msg == "bad render"));
    }
}
