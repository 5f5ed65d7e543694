//! Process-wide and per-context configuration.
//!
//! The default wait timeout is resolved in this order:
//!
//! 1. an explicit timeout passed to a wait helper;
//! 2. [`TestContextOptions::default_wait_timeout`];
//! 3. the process-wide value from [`set_default_wait_timeout`], or the
//!    `RENDERTEST_WAIT_TIMEOUT_MS` environment variable, or one second.
//!
//! Step 3 yields an unbounded timeout while a debugger is attached so that
//! stepping through a test does not trip its waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable overriding the process-wide wait timeout.
pub const WAIT_TIMEOUT_ENV: &str = "RENDERTEST_WAIT_TIMEOUT_MS";

/// Process-wide wait timeout used when nothing overrides it.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Render passes allowed per dispatch item before [`crate::Error::RenderLoop`].
pub const DEFAULT_MAX_RENDER_PASSES: usize = 1000;

const UNSET: u64 = u64::MAX;

static WAIT_TIMEOUT_MS: AtomicU64 = AtomicU64::new(UNSET);

/// Options for a [`crate::TestContext`] and the renderer it owns.
#[derive(Clone, Debug)]
pub struct TestContextOptions {
    /// Timeout used by wait helpers called without an explicit timeout.
    /// `None` defers to the process-wide default.
    pub default_wait_timeout: Option<Duration>,
    /// Name of the dispatch thread.
    pub thread_name: String,
    /// Render passes allowed per dispatch item.
    pub max_render_passes: usize,
}

impl Default for TestContextOptions {
    fn default() -> Self {
        Self {
            default_wait_timeout: None,
            thread_name: "rendertest-dispatch".to_string(),
            max_render_passes: DEFAULT_MAX_RENDER_PASSES,
        }
    }
}

impl TestContextOptions {
    /// Set the wait timeout for this context.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = Some(timeout);
        self
    }

    /// Set the dispatch thread name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Resolve the timeout for a wait call.
    pub(crate) fn resolve_timeout(&self, explicit: Option<Duration>) -> Option<Duration> {
        explicit
            .or(self.default_wait_timeout)
            .or_else(default_wait_timeout)
    }
}

/// Set the process-wide default wait timeout.
pub fn set_default_wait_timeout(timeout: Duration) {
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(UNSET - 1);
    WAIT_TIMEOUT_MS.store(ms.min(UNSET - 1), Ordering::SeqCst);
}

/// The process-wide default wait timeout; `None` means wait forever.
#[must_use]
pub fn default_wait_timeout() -> Option<Duration> {
    if debugger_attached() {
        return None;
    }
    let ms = WAIT_TIMEOUT_MS.load(Ordering::SeqCst);
    if ms != UNSET {
        return Some(Duration::from_millis(ms));
    }
    Some(env_wait_timeout().unwrap_or(DEFAULT_WAIT_TIMEOUT))
}

fn env_wait_timeout() -> Option<Duration> {
    static FROM_ENV: OnceLock<Option<Duration>> = OnceLock::new();
    *FROM_ENV.get_or_init(|| {
        std::env::var(WAIT_TIMEOUT_ENV)
            .ok()
            .and_then(|raw| parse_millis(&raw))
    })
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_millis)
}

/// Whether a debugger is tracing this process.
#[must_use]
pub fn debugger_attached() -> bool {
    static ATTACHED: OnceLock<bool> = OnceLock::new();
    *ATTACHED.get_or_init(detect_debugger)
}

#[cfg(target_os = "linux")]
fn detect_debugger() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| tracer_pid(&status))
        .is_some_and(|pid| pid != 0)
}

#[cfg(not(target_os = "linux"))]
fn detect_debugger() -> bool {
    false
}

fn tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse().ok())
}
