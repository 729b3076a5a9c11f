//! Events and handlers for the [`RetryCoordinator`](super::RetryCoordinator).
//!
//! The coordinator reports every decision it makes through [`RetryEvent`]
//! variants, from the first failure report of an incident through retry
//! dispatch to recovery or stop. Callers implement [`EventHandler`] to
//! observe them for logging, UI updates, metrics, or test assertions.
//!
//! Handlers are invoked after the state lock is released, so they may call
//! back into the coordinator (e.g. [`snapshot`](super::RetryCoordinator::snapshot)).
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or embeddings that only need notifications |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::failure::FailureKind;

/// Events emitted by the coordinator.
#[derive(Debug)]
pub enum RetryEvent<'a> {
    /// A new matching request released a held failure lock.
    LockReset,
    /// A failure report opened a new episode.
    FailureReported {
        kind: FailureKind,
        reason: &'a str,
        failure_count: u32,
        max_failures: u32,
    },
    /// A failure report arrived while an episode was already in progress.
    DuplicateSuppressed { kind: FailureKind, reason: &'a str },
    /// A failure report arrived after retrying stopped.
    IgnoredWhileStopped { kind: FailureKind, reason: &'a str },
    /// The regenerate action will run after `delay`.
    RetryScheduled { attempt: u32, delay: Duration },
    /// The regenerate action was invoked.
    RetryDispatched { attempt: u32 },
    /// The regenerate action could not run; the lock was released.
    TriggerUnavailable { attempt: u32, error: &'a str },
    /// A scheduled retry was cancelled because the request recovered first.
    RetryCancelled { attempt: u32 },
    /// The failure limit was reached.
    Stopped { failure_count: u32 },
    /// A success followed one or more failures.
    Recovered { attempts: u32 },
    /// State was cleared by an external reset.
    Reset,
}

/// Handler for coordinator events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &RetryEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let RetryEvent::Stopped { failure_count } = event {
///         eprintln!("gave up after {failure_count} failures");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&RetryEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&RetryEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&RetryEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &RetryEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to every inner handler, in registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(verbose, DebugHandler::new());
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler from an `Option`. `None` is a no-op.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &RetryEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &RetryEvent<'_>) {
        match event {
            RetryEvent::LockReset => {
                debug!("New matching request; failure lock released");
            }
            RetryEvent::FailureReported {
                kind,
                reason,
                failure_count,
                max_failures,
            } => {
                warn!("Failure {failure_count}/{max_failures} ({kind}): {reason}");
            }
            RetryEvent::DuplicateSuppressed { kind, reason } => {
                info!("Already handling a failure; ignoring {kind} report: {reason}");
            }
            RetryEvent::IgnoredWhileStopped { kind, reason } => {
                debug!("Retrying is stopped; ignoring {kind} report: {reason}");
            }
            RetryEvent::RetryScheduled { attempt, delay } => {
                info!("Retry #{attempt} in {}ms", delay.as_millis());
            }
            RetryEvent::RetryDispatched { attempt } => {
                info!("Retry #{attempt} dispatched");
            }
            RetryEvent::TriggerUnavailable { attempt, error } => {
                error!("Retry #{attempt} could not run: {error}");
            }
            RetryEvent::RetryCancelled { attempt } => {
                debug!("Retry #{attempt} cancelled; request already recovered");
            }
            RetryEvent::Stopped { failure_count } => {
                error!("Reached {failure_count} consecutive failures; retrying stopped");
            }
            RetryEvent::Recovered { attempts } => {
                info!("Request succeeded; failure count reset after {attempts} attempt(s)");
            }
            RetryEvent::Reset => {
                info!("Retry state reset");
            }
        }
    }
}
