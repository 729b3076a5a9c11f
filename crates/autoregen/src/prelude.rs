//! Convenience re-exports for common `autoregen` types.
//!
//! ```ignore
//! use autoregen::prelude::*;
//! ```
//!
//! Covers wiring a guard and talking to it. Decorator internals
//! ([`PendingRequest`](crate::api::PendingRequest), the timer) stay in their
//! modules.

// ── Wiring ──────────────────────────────────────────────────────────
pub use crate::config::{RetryConfig, RetrySettings, TargetMatcher};
pub use crate::guard::{AutoRetry, HostBindings};

// ── Transport ───────────────────────────────────────────────────────
pub use crate::api::{
    BackoffConfig, CompletionObserver, HttpRequest, HttpResponse, Intercepted, LoggingObserver,
    Observed, ReqwestTransport, Transport, TransportError,
};

// ── Retry ───────────────────────────────────────────────────────────
pub use crate::retry::{
    ActionTrigger, ChannelTrigger, CompositeEventHandler, EventHandler, Failure, FailureKind,
    FnEventHandler, FnTrigger, LoggingHandler, RegenerateCommand, RetryCoordinator, RetryEvent,
    RetryPhase, RetrySnapshot,
};

// ── Host ────────────────────────────────────────────────────────────
pub use crate::host::{EventSource, HostSignal, SignalBus, await_ready, wait_for_ready};

// ── UI ──────────────────────────────────────────────────────────────
pub use crate::ui::{FnSink, Notification, NotificationSink, NotifyLevel, Toast, ToastQueue};
