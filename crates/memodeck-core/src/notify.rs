//! User-facing failure notifications.
//!
//! The API client surfaces terminal request failures (timeouts, retry
//! exhaustion) through this seam when a call's `show_error` flag is set.
//! The UI layer installs its own implementation; the default just logs.

use tracing::warn;

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Default notifier: records the message in the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!(message, "User-facing error");
    }
}

/// Notifier that drops every message. For background work and tests.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &str) {}
}
