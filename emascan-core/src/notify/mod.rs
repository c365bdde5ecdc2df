//! Outbound notifications.
//!
//! Delivery is best-effort: a failed send is logged by the caller and never
//! aborts a scan or a monitoring pass.

pub mod telegram;

use std::sync::Mutex;
use thiserror::Error;

pub use telegram::{escape_markdown_v2, TelegramNotifier};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A sink for human-readable announcements.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes announcements to the log. Used when no chat is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "emascan::announce", "{message}");
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
        Ok(())
    }
}

/// Send and log failure; returns whether the message went out.
pub fn announce(notifier: &dyn Notifier, message: &str) -> bool {
    match notifier.notify(message) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "failed to deliver notification");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Notifier for Broken {
        fn notify(&self, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("offline".into()))
        }
    }

    #[test]
    fn recording_keeps_order() {
        let n = RecordingNotifier::new();
        assert!(announce(&n, "one"));
        assert!(announce(&n, "two"));
        assert_eq!(n.messages(), vec!["one", "two"]);
    }

    #[test]
    fn failed_delivery_is_swallowed() {
        assert!(!announce(&Broken, "lost"));
        assert!(announce(&LogNotifier, "kept"));
    }
}
