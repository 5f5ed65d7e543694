//! Log callback system.
//!
//! Every message is emitted as a `tracing` event under the `rendertest`
//! target. A process-wide callback can additionally be installed to capture
//! messages without a subscriber, e.g. to assert on them in a test.

use std::sync::{Mutex, OnceLock, PoisonError};

/// Log level for debug callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync + 'static>;

fn log_callback() -> &'static Mutex<Option<LogCallback>> {
    static CALLBACK: OnceLock<Mutex<Option<LogCallback>>> = OnceLock::new();
    CALLBACK.get_or_init(|| Mutex::new(None))
}

/// Set the global log callback.
pub fn set_log_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    let mut guard = log_callback()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = Some(Box::new(callback));
}

/// Remove the global log callback.
pub fn clear_log_callback() {
    let mut guard = log_callback()
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    *guard = None;
}

/// Emit a log event.
pub fn emit_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "rendertest", "{message}"),
        LogLevel::Info => tracing::info!(target: "rendertest", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "rendertest", "{message}"),
        LogLevel::Error => tracing::error!(target: "rendertest", "{message}"),
    }

    if let Ok(guard) = log_callback().lock() {
        if let Some(callback) = guard.as_ref() {
            callback(level, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_log_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set_log_callback(move |level, msg| {
            if msg.starts_with("log-callback-test") {
                sink.lock().unwrap().push((level, msg.to_string()));
            }
        });
        emit_log(LogLevel::Warn, "log-callback-test hello");
        clear_log_callback();
        emit_log(LogLevel::Warn, "log-callback-test after clear");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(LogLevel::Warn, "log-callback-test hello".to_string())]
        );
    }
}
