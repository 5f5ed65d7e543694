//! Render-aware waiting.
//!
//! A wait checks its condition once immediately. If that fails it subscribes
//! to dispatch completions and re-checks after every completed item until
//! the condition passes, the timeout elapses, or the wait is disposed.
//! Whichever of those gets the helper's lock first decides the outcome; the
//! others find the slot filled and do nothing.
//!
//! Re-checks run on the dispatch thread, so a checker must not block on the
//! dispatcher. Calling [`Dispatcher::invoke`](crate::Dispatcher::invoke)
//! from a checker fails with [`Error::ReentrantDispatch`].

mod helpers;

pub use helpers::{AsFragment, WaitFor};

use crate::error::{Error, Result, WaitFailureKind, WaitForFailed};
use crate::event::{LogLevel, emit_log};
use crate::fragment::RenderedFragment;
use crate::renderer::{DispatchObserver, RenderEvent, SubscriptionId, guarded};
use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

/// What a wait does when its checker returns an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckerErrorPolicy {
    /// Remember the error and report it if the wait times out.
    #[default]
    KeepWaiting,
    /// Fail the wait immediately, wrapping the error.
    FailFast,
}

#[derive(Clone, Debug)]
pub struct WaitOptions {
    /// Explicit timeout. `None` uses the context default.
    pub timeout: Option<Duration>,
    pub on_checker_error: CheckerErrorPolicy,
    pub timeout_message: String,
    pub checker_failed_message: String,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            on_checker_error: CheckerErrorPolicy::KeepWaiting,
            timeout_message: "The condition did not pass before the timeout period passed."
                .to_string(),
            checker_failed_message: "The condition raised an error before it passed."
                .to_string(),
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn fail_fast(mut self) -> Self {
        self.on_checker_error = CheckerErrorPolicy::FailFast;
        self
    }

    #[must_use]
    pub fn with_messages(
        mut self,
        timeout_message: impl Into<String>,
        checker_failed_message: impl Into<String>,
    ) -> Self {
        self.timeout_message = timeout_message.into();
        self.checker_failed_message = checker_failed_message.into();
        self
    }
}

type Checker<T> = Box<dyn FnMut(&RenderedFragment) -> Result<Option<T>> + Send>;

enum Outcome<T> {
    Pending,
    Ready(Result<T>),
    Taken,
}

impl<T> Outcome<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn take(&mut self) -> Option<Result<T>> {
        match std::mem::replace(self, Self::Taken) {
            Self::Ready(result) => Some(result),
            Self::Pending => {
                *self = Self::Pending;
                None
            }
            Self::Taken => Some(Err(Error::WaitCanceled)),
        }
    }
}

struct Inner<T> {
    checker: Option<Checker<T>>,
    policy: CheckerErrorPolicy,
    timeout_message: String,
    checker_failed_message: String,
    timeout: Option<Duration>,
    check_count: u64,
    last_error: Option<Error>,
    outcome: Outcome<T>,
    waker: Option<Waker>,
    subscription: Option<SubscriptionId>,
    /// Dropping or signalling this stops the timer thread.
    timer: Option<Sender<()>>,
}

struct HelperCore<T> {
    fragment: RenderedFragment,
    inner: Mutex<Inner<T>>,
    done: Condvar,
}

impl<T: Send + 'static> HelperCore<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if inner.outcome.is_pending() {
            self.run_checker(inner);
        }
    }

    fn run_checker(&self, inner: &mut Inner<T>) {
        let Some(checker) = inner.checker.as_mut() else {
            return;
        };
        inner.check_count += 1;
        let fragment = &self.fragment;
        match guarded(|| checker(fragment)) {
            Ok(Some(value)) => self.finish(inner, Ok(value)),
            Ok(None) => {}
            Err(e) => match inner.policy {
                CheckerErrorPolicy::KeepWaiting => inner.last_error = Some(e),
                CheckerErrorPolicy::FailFast => {
                    let failed = self.failure(inner, WaitFailureKind::CheckerFailed, Some(e));
                    self.finish(inner, Err(failed));
                }
            },
        }
    }

    fn failure(&self, inner: &Inner<T>, kind: WaitFailureKind, cause: Option<Error>) -> Error {
        let message = match kind {
            WaitFailureKind::Timeout => inner.timeout_message.clone(),
            WaitFailureKind::CheckerFailed => inner.checker_failed_message.clone(),
        };
        WaitForFailed {
            kind,
            message,
            check_count: inner.check_count,
            render_count: self.fragment.render_count(),
            total_render_count: self.fragment.dispatcher().total_render_count(),
            timeout: inner.timeout,
            inner: cause.map(Box::new),
        }
        .into()
    }

    /// Fill the slot and release every resource. Callers check `Pending`.
    fn finish(&self, inner: &mut Inner<T>, result: Result<T>) {
        inner.outcome = Outcome::Ready(result);
        inner.checker = None;
        if let Some(id) = inner.subscription.take() {
            self.fragment.dispatcher().unsubscribe(id);
        }
        if let Some(cancel) = inner.timer.take() {
            let _ = cancel.send(());
        }
        if let Some(waker) = inner.waker.take() {
            waker.wake();
        }
        self.done.notify_all();
    }

    fn resolve(&self, result: Result<T>) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.outcome.is_pending() {
            return false;
        }
        self.finish(inner, result);
        true
    }

    fn on_timeout(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.outcome.is_pending() {
            return;
        }
        let cause = inner.last_error.take();
        let failed = self.failure(inner, WaitFailureKind::Timeout, cause);
        emit_log(LogLevel::Debug, &format!("wait timed out: {failed}"));
        self.finish(inner, Err(failed));
    }

    fn is_pending(&self) -> bool {
        self.lock().outcome.is_pending()
    }
}

/// Subscribed on behalf of a pending wait.
struct HelperObserver<T> {
    core: Weak<HelperCore<T>>,
}

impl<T: Send + 'static> DispatchObserver for HelperObserver<T> {
    fn on_dispatch_completed(&self, _event: &RenderEvent) {
        if let Some(core) = self.core.upgrade() {
            core.check();
        }
    }

    fn on_dispatch_error(&self, error: Error) -> Option<Error> {
        let Some(core) = self.core.upgrade() else {
            return Some(error);
        };
        let mut guard = core.lock();
        let inner = &mut *guard;
        if !inner.outcome.is_pending() {
            return Some(error);
        }
        core.finish(inner, Err(error));
        None
    }

    fn on_renderer_disposed(&self) {
        if let Some(core) = self.core.upgrade() {
            core.resolve(Err(Error::WaitCanceled));
        }
    }

    fn is_active(&self) -> bool {
        self.core.upgrade().is_some_and(|core| core.is_pending())
    }
}

/// Starts waits.
pub struct WaitForHelper;

impl WaitForHelper {
    /// Start waiting for `checker` to return `Ok(Some(_))`.
    ///
    /// The checker runs once before this returns. If it passes, the task is
    /// already complete and no subscription or timer is created.
    pub fn start<T, F>(fragment: &RenderedFragment, checker: F, options: WaitOptions) -> WaitTask<T>
    where
        T: Send + 'static,
        F: FnMut(&RenderedFragment) -> Result<Option<T>> + Send + 'static,
    {
        let dispatcher = fragment.dispatcher().clone();
        let timeout = dispatcher.options().resolve_timeout(options.timeout);
        let core = Arc::new(HelperCore {
            fragment: fragment.clone(),
            inner: Mutex::new(Inner {
                checker: Some(Box::new(checker)),
                policy: options.on_checker_error,
                timeout_message: options.timeout_message,
                checker_failed_message: options.checker_failed_message,
                timeout,
                check_count: 0,
                last_error: None,
                outcome: Outcome::Pending,
                waker: None,
                subscription: None,
                timer: None,
            }),
            done: Condvar::new(),
        });
        let task = WaitTask {
            core: Arc::clone(&core),
        };

        let seen = dispatcher.completed_items();
        core.check();
        if !core.is_pending() {
            return task;
        }

        let mut guard = core.lock();
        let inner = &mut *guard;
        if !inner.outcome.is_pending() {
            drop(guard);
            return task;
        }
        let observer = Arc::new(HelperObserver {
            core: Arc::downgrade(&core),
        });
        let Some(id) = dispatcher.subscribe(observer) else {
            core.finish(inner, Err(Error::RendererDisposed));
            drop(guard);
            return task;
        };
        inner.subscription = Some(id);

        // An item that completed before the subscription was never observed.
        if dispatcher.completed_items() != seen {
            core.run_checker(inner);
        }

        if inner.outcome.is_pending() {
            if let Some(timeout) = timeout {
                match arm_timer(&core, timeout) {
                    Ok(cancel) => inner.timer = Some(cancel),
                    Err(e) => core.finish(inner, Err(Error::Io(e))),
                }
            }
        }
        drop(guard);
        task
    }

    /// A task that is already complete.
    pub fn resolved<T: Send + 'static>(fragment: &RenderedFragment, result: Result<T>) -> WaitTask<T> {
        let core = Arc::new(HelperCore {
            fragment: fragment.clone(),
            inner: Mutex::new(Inner {
                checker: None,
                policy: CheckerErrorPolicy::KeepWaiting,
                timeout_message: String::new(),
                checker_failed_message: String::new(),
                timeout: None,
                check_count: 0,
                last_error: None,
                outcome: Outcome::Ready(result),
                waker: None,
                subscription: None,
                timer: None,
            }),
            done: Condvar::new(),
        });
        WaitTask { core }
    }
}

/// Parks a thread until `timeout` elapses or the wait finishes.
fn arm_timer<T: Send + 'static>(
    core: &Arc<HelperCore<T>>,
    timeout: Duration,
) -> std::io::Result<Sender<()>> {
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    let weak = Arc::downgrade(core);
    thread::Builder::new()
        .name("rendertest-wait-timer".to_string())
        .spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(timeout) {
                if let Some(core) = weak.upgrade() {
                    core.on_timeout();
                }
            }
        })?;
    Ok(cancel_tx)
}

/// A pending or completed wait.
///
/// Block on it with [`wait`](Self::wait) or `.await` it. Dropping an
/// unfinished task disposes it.
#[must_use = "a wait task does nothing useful unless waited on"]
pub struct WaitTask<T: Send + 'static> {
    core: Arc<HelperCore<T>>,
}

impl<T: Send + 'static> std::fmt::Debug for WaitTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.lock();
        f.debug_struct("WaitTask")
            .field("pending", &inner.outcome.is_pending())
            .field("check_count", &inner.check_count)
            .field("timeout", &inner.timeout)
            .finish()
    }
}

impl<T: Send + 'static> WaitTask<T> {
    /// Block until the wait completes.
    ///
    /// Re-checks run on the dispatch thread, so blocking there on a pending
    /// wait fails with [`Error::ReentrantDispatch`] and disposes the task.
    pub fn wait(self) -> Result<T> {
        let mut inner = self.core.lock();
        loop {
            if let Some(result) = inner.outcome.take() {
                return result;
            }
            if self.core.fragment.dispatcher().is_dispatch_thread() {
                return Err(Error::ReentrantDispatch);
            }
            inner = self
                .core
                .done
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        !self.core.is_pending()
    }

    /// Times the checker has run, including the initial check.
    #[must_use]
    pub fn check_count(&self) -> u64 {
        self.core.lock().check_count
    }

    /// Whether the wait is subscribed to dispatch completions.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.core.lock().subscription.is_some()
    }

    /// The resolved timeout; `None` waits forever.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.core.lock().timeout
    }

    /// Cancel the wait with [`Error::WaitCanceled`]. No-op once complete.
    pub fn dispose(&self) {
        self.core.resolve(Err(Error::WaitCanceled));
    }
}

impl<T: Send + 'static> Drop for WaitTask<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Send + 'static> Future for WaitTask<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.core.lock();
        if let Some(result) = inner.outcome.take() {
            return Poll::Ready(result);
        }
        inner.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_take_once() {
        let mut outcome: Outcome<u8> = Outcome::Ready(Ok(3));
        assert!(matches!(outcome.take(), Some(Ok(3))));
        assert!(matches!(outcome.take(), Some(Err(Error::WaitCanceled))));

        let mut pending: Outcome<u8> = Outcome::Pending;
        assert!(pending.take().is_none());
        assert!(pending.is_pending());
    }

    #[test]
    fn test_options_builders() {
        let opts = WaitOptions::default()
            .with_timeout(Some(Duration::from_millis(5)))
            .fail_fast()
            .with_messages("late", "broken");
        assert_eq!(opts.timeout, Some(Duration::from_millis(5)));
        assert_eq!(opts.on_checker_error, CheckerErrorPolicy::FailFast);
        assert_eq!(opts.timeout_message, "late");
        assert_eq!(opts.checker_failed_message, "broken");
    }
}
