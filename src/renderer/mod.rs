//! Test renderer with a dedicated dispatch thread.
//!
//! [`TestRenderer`] owns the thread that runs every component lifecycle
//! call. Everything else talks to it through a cloneable [`Dispatcher`]:
//! blocking [`invoke`](Dispatcher::invoke) for test code, fire-and-forget
//! [`post`](Dispatcher::post) for asynchronous continuations.
//!
//! # Teardown
//!
//! Dropping the renderer sends a shutdown command. Items queued before it
//! still run; later requests fail with [`Error::RendererDisposed`]. All
//! components are then disposed, pending waits are cancelled, and the
//! thread is joined.
//!
//! ```
//! use rendertest::{TestContextOptions, TestRenderer};
//!
//! let renderer = TestRenderer::new(TestContextOptions::default())?;
//! let count = renderer.dispatcher().invoke(|tree| Ok(tree.component_count()))?;
//! assert_eq!(count, 0);
//! # Ok::<(), rendertest::Error>(())
//! ```

mod dispatcher;
mod stream;
pub(crate) mod tree;

pub use dispatcher::{Dispatcher, UnhandledError};
pub use stream::{ChangeFlags, ComponentChange, RenderEvent};
pub use tree::ComponentTree;

pub(crate) use dispatcher::{guarded, panic_message};
pub(crate) use stream::{DispatchObserver, SubscriptionId};

use crate::config::TestContextOptions;
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_log};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use stream::ChannelObserver;

/// Owns the dispatch thread of one test context.
pub struct TestRenderer {
    dispatcher: Dispatcher,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for TestRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRenderer")
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl TestRenderer {
    /// Spawn the dispatch thread.
    pub fn new(options: TestContextOptions) -> Result<Self> {
        let thread_name = options.thread_name.clone();
        let (dispatcher, rx) = Dispatcher::channel(options);
        let loop_dispatcher = dispatcher.clone();

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || dispatcher::run(rx, loop_dispatcher))?;
        dispatcher.set_dispatch_thread(handle.thread().id());

        Ok(Self {
            dispatcher,
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn options(&self) -> &TestContextOptions {
        self.dispatcher.options()
    }

    /// Component renders performed so far.
    #[must_use]
    pub fn total_render_count(&self) -> u64 {
        self.dispatcher.total_render_count()
    }

    /// Remove and return the stored unhandled error.
    #[must_use]
    pub fn take_unhandled_error(&self) -> Option<Error> {
        self.dispatcher.unhandled().take()
    }

    /// Block until an unhandled error is stored, the renderer is disposed,
    /// or `timeout` elapses.
    #[must_use]
    pub fn wait_for_unhandled_error(&self, timeout: Option<Duration>) -> Option<Error> {
        self.dispatcher.unhandled().wait(timeout)
    }

    /// Resolves with the next unhandled error.
    pub fn unhandled_error(&self) -> UnhandledError {
        UnhandledError::new(self.dispatcher.clone())
    }

    /// Subscribe to the render event stream.
    ///
    /// One event arrives per completed dispatch item, in order. Dropping
    /// the receiver ends the subscription.
    pub fn render_events(&self) -> Result<Receiver<RenderEvent>> {
        let (observer, rx) = ChannelObserver::new();
        self.dispatcher
            .subscribe(observer)
            .ok_or(Error::RendererDisposed)?;
        Ok(rx)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.handle.is_none() || self.dispatcher.is_disposed()
    }

    /// Shut down the dispatch thread and wait for it to exit.
    ///
    /// Called on the dispatch thread itself, this only requests shutdown.
    pub fn dispose(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.dispatcher.shutdown();
        if self.dispatcher.is_dispatch_thread() {
            return;
        }
        if handle.join().is_err() {
            emit_log(LogLevel::Error, "dispatch thread panicked during shutdown");
        }
    }
}

impl Drop for TestRenderer {
    fn drop(&mut self) {
        self.dispose();
    }
}
