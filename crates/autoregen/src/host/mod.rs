//! Capabilities supplied by the host application.
//!
//! The guard needs three things from its host: a source of lifecycle
//! signals ([`EventSource`]), a way to regenerate
//! ([`ActionTrigger`](crate::retry::ActionTrigger)), and optionally a place
//! to show notifications ([`NotificationSink`](crate::ui::NotificationSink)).

pub mod readiness;
pub mod signals;

pub use readiness::{await_ready, wait_for_ready};
pub use signals::{EventSource, HostSignal, SignalBus, SignalListener};
