//! User-facing status surfaces.
//!
//! - [`notify`]: [`Notification`] values, the [`NotificationSink`] trait,
//!   and the [`Notifier`] that falls back to `tracing` when no sink is set.
//! - [`toast`]: [`ToastQueue`], a bounded in-memory sink a frontend drains.

pub mod notify;
pub mod toast;

pub use notify::{FnSink, Notification, NotificationSink, Notifier, NotifyLevel};
pub use toast::{Toast, ToastQueue};
