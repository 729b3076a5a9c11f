//! Best-effort user notifications with a logging fallback.
//!
//! The coordinator talks to a [`Notifier`], never to a sink directly. When a
//! [`NotificationSink`] is registered the notifier hands it each message;
//! when none is registered, or the sink reports an error, the message is
//! written as a leveled `tracing` line instead. Notification failures never
//! reach the caller.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Severity of a notification. Mirrors toast styles (info / warning / error).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotifyLevel {
    /// Short fixed-width label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO ",
            Self::Success => "OK   ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }
}

/// A title + message pair destined for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotifyLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotifyLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Error, title, message)
    }
}

/// A surface that can display notifications (toast area, status bar, ...).
///
/// Implementations must not block. Return `Err` when the surface is
/// unavailable; the [`Notifier`] logs the message instead.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: &Notification) -> Result<(), String>;
}

/// Sink backed by a closure. Handy in tests and small embeddings.
pub struct FnSink<F>(F)
where
    F: Fn(&Notification) -> Result<(), String> + Send + Sync;

impl<F> FnSink<F>
where
    F: Fn(&Notification) -> Result<(), String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> NotificationSink for FnSink<F>
where
    F: Fn(&Notification) -> Result<(), String> + Send + Sync,
{
    fn show(&self, notification: &Notification) -> Result<(), String> {
        (self.0)(notification)
    }
}

/// Routes notifications to an optional sink, falling back to `tracing`.
#[derive(Clone, Default)]
pub struct Notifier {
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Notifier {
    /// A notifier with no surface: every message is logged.
    pub fn logging_only() -> Self {
        Self { sink: None }
    }

    pub fn with_sink(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Display `notification`, best effort.
    pub fn notify(&self, notification: Notification) {
        if let Some(sink) = &self.sink {
            match sink.show(&notification) {
                Ok(()) => return,
                Err(e) => warn!("Notification sink unavailable ({e}); logging instead"),
            }
        }
        log_notification(&notification);
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("has_sink", &self.has_sink())
            .finish()
    }
}

fn log_notification(n: &Notification) {
    match n.level {
        NotifyLevel::Info | NotifyLevel::Success => {
            info!("[notice] {}: {}", n.title, n.message)
        }
        NotifyLevel::Warning => warn!("[notice] {}: {}", n.title, n.message),
        NotifyLevel::Error => error!("[notice] {}: {}", n.title, n.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn forwards_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let notifier = Notifier::with_sink(Arc::new(FnSink::new(move |n: &Notification| {
            s.lock().unwrap().push(n.title.clone());
            Ok(())
        })));

        notifier.notify(Notification::info("Auto-retry #1", "HTTP status 500"));
        assert_eq!(*seen.lock().unwrap(), vec!["Auto-retry #1".to_string()]);
    }

    #[test]
    fn failing_sink_does_not_propagate() {
        let notifier = Notifier::with_sink(Arc::new(FnSink::new(|_: &Notification| {
            Err("toast container missing".to_string())
        })));
        // Falls back to logging; nothing to assert beyond not panicking.
        notifier.notify(Notification::error("Auto-retry stopped", "4 failures"));
        assert!(notifier.has_sink());
    }

    #[test]
    fn logging_only_has_no_sink() {
        let notifier = Notifier::logging_only();
        assert!(!notifier.has_sink());
        notifier.notify(Notification::warning("t", "m"));
    }

    #[test]
    fn level_serializes_lowercase() {
        let json = serde_json::to_string(&NotifyLevel::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
