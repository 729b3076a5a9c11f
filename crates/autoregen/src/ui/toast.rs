//! In-memory toast queue: a [`NotificationSink`] that a frontend drains.
//!
//! The queue has its own mutex and a hard cap, so a burst of notifications
//! before the next drain never grows without bound and pushing never waits
//! on the frontend.

use std::sync::{Arc, Mutex};

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::notify::{Notification, NotificationSink, NotifyLevel};

/// Maximum toasts held before the oldest are discarded.
pub const MAX_TOASTS: usize = 200;
/// Trim to this many when the cap is exceeded.
pub const TOAST_TRIM_TO: usize = 100;

/// A notification stamped with the local time it was raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub time: String,
    pub level: NotifyLevel,
    pub title: String,
    pub message: String,
}

impl Toast {
    /// Render as a single display line.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}: {}",
            self.time,
            self.level.label(),
            self.title,
            self.message
        )
    }
}

/// Shared, cloneable toast buffer.
#[derive(Clone, Default)]
pub struct ToastQueue(Arc<Mutex<Vec<Toast>>>);

impl ToastQueue {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::with_capacity(16))))
    }

    /// Take all pending toasts.
    pub fn drain(&self) -> Vec<Toast> {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }

    /// Number of toasts waiting to be drained.
    pub fn len(&self) -> usize {
        self.0.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for ToastQueue {
    fn show(&self, notification: &Notification) -> Result<(), String> {
        let toast = Toast {
            time: Local::now().format("%H:%M:%S").to_string(),
            level: notification.level,
            title: notification.title.clone(),
            message: notification.message.clone(),
        };
        let mut buf = self
            .0
            .lock()
            .map_err(|_| "toast queue poisoned".to_string())?;
        buf.push(toast);
        if buf.len() > MAX_TOASTS {
            let trim = buf.len() - TOAST_TRIM_TO;
            buf.drain(..trim);
        }
        Ok(())
    }
}
