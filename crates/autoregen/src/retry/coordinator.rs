//! The retry state machine.
//!
//! [`RetryCoordinator`] owns the failure count and the failure lock. Every
//! outcome of a watched request, and every failure signal from the host,
//! ends up in one of three calls:
//!
//! - [`begin_request`](RetryCoordinator::begin_request): a new matching
//!   request is about to be sent; the failure lock is released.
//! - [`report_success`](RetryCoordinator::report_success): always accepted;
//!   clears the count, the lock, and the stopped flag.
//! - [`report_failure`](RetryCoordinator::report_failure): the first report
//!   of an incident opens an episode (count + 1, then retry or stop); any
//!   report arriving while the lock is held is dropped.
//!
//! ```text
//!            failure (count < max)              trigger invoked
//!   Idle ────────────────────────▶ HandlingFailure ──────────────▶ Idle
//!    ▲  ╲                              │  ▲ failure: suppressed
//!    │   ╲ failure (count ≥ max)       └──┘
//!    │    ▼
//!    └── Stopped ◀── failure: ignored
//!   success
//! ```
//!
//! The state mutex is held only while a transition is computed. Events and
//! notifications go out after it is released.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::events::{EventHandler, LoggingHandler, RetryEvent};
use super::failure::Failure;
use super::state::{PendingRetry, RetryPhase, RetrySnapshot, RetryState};
use super::trigger::{ActionTrigger, RetryTrigger, TriggerOutcome};
use crate::config::RetryConfig;
use crate::timer::Timer;
use crate::ui::{Notification, Notifier};

/// Shared handle to the retry state machine. Cheap to clone.
#[derive(Clone)]
pub struct RetryCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: RetryConfig,
    state: Mutex<RetryState>,
    trigger: RetryTrigger,
    notifier: Notifier,
    events: Arc<dyn EventHandler>,
}

/// Builder for [`RetryCoordinator`].
pub struct CoordinatorBuilder {
    config: RetryConfig,
    action: Arc<dyn ActionTrigger>,
    notifier: Notifier,
    events: Arc<dyn EventHandler>,
    timer: Timer,
}

impl CoordinatorBuilder {
    /// Where user-facing notifications go. Defaults to logging only.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Observer for coordinator events. Defaults to [`LoggingHandler`].
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = handler;
        self
    }

    pub fn timer(mut self, timer: Timer) -> Self {
        self.timer = timer;
        self
    }

    /// Validate the config and build the coordinator.
    pub fn build(self) -> Result<RetryCoordinator, String> {
        self.config.validate()?;
        let trigger = RetryTrigger::new(self.action, self.config.retry_delay, self.timer);
        Ok(RetryCoordinator {
            inner: Arc::new(Inner {
                config: self.config,
                state: Mutex::new(RetryState::default()),
                trigger,
                notifier: self.notifier,
                events: self.events,
            }),
        })
    }
}

enum Decision {
    Suppressed,
    IgnoredWhileStopped,
    Stop {
        failure_count: u32,
        superseded: Option<PendingRetry>,
    },
    Retry {
        attempt: u32,
        episode: u64,
        superseded: Option<PendingRetry>,
    },
}

impl RetryCoordinator {
    pub fn builder(config: RetryConfig, action: Arc<dyn ActionTrigger>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            action,
            notifier: Notifier::logging_only(),
            events: Arc::new(LoggingHandler),
            timer: Timer::new(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, RetryState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: RetryEvent<'_>) {
        self.inner.events.on_event(&event);
    }

    // ── Inputs ──

    /// A new matching request is about to be sent. Releases the failure
    /// lock so this attempt can drive a fresh retry decision.
    pub fn begin_request(&self) {
        let released = std::mem::replace(&mut self.state().is_handling_failure, false);
        if released {
            self.emit(RetryEvent::LockReset);
        }
    }

    /// A matching request succeeded.
    pub fn report_success(&self) {
        let (previous, pending) = {
            let mut st = self.state();
            let previous = st.failure_count;
            st.failure_count = 0;
            st.is_handling_failure = false;
            st.stopped = false;
            // A retry still being scheduled for the old episode must not arm.
            st.episode += 1;
            (previous, st.pending_retry.take())
        };

        if let Some(p) = pending
            && p.handle.cancel()
        {
            self.emit(RetryEvent::RetryCancelled { attempt: p.attempt });
        }

        if previous > 0 {
            self.emit(RetryEvent::Recovered { attempts: previous });
            let noun = if previous == 1 { "attempt" } else { "attempts" };
            self.inner.notifier.notify(Notification::success(
                "Retry succeeded",
                format!("Recovered after {previous} {noun}."),
            ));
        } else {
            debug!("Matching request succeeded");
        }
    }

    /// A matching request (or the host) reported a failure.
    pub fn report_failure(&self, failure: Failure) {
        let max_failures = self.inner.config.max_failures;
        let decision = {
            let mut st = self.state();
            if st.is_handling_failure {
                Decision::Suppressed
            } else if st.stopped {
                Decision::IgnoredWhileStopped
            } else {
                st.is_handling_failure = true;
                st.failure_count += 1;
                st.episode += 1;
                let superseded = st.pending_retry.take();
                if st.failure_count >= max_failures {
                    st.stopped = true;
                    Decision::Stop {
                        failure_count: st.failure_count,
                        superseded,
                    }
                } else {
                    Decision::Retry {
                        attempt: st.failure_count,
                        episode: st.episode,
                        superseded,
                    }
                }
            }
        };

        match decision {
            Decision::Suppressed => self.emit(RetryEvent::DuplicateSuppressed {
                kind: failure.kind,
                reason: &failure.reason,
            }),
            Decision::IgnoredWhileStopped => self.emit(RetryEvent::IgnoredWhileStopped {
                kind: failure.kind,
                reason: &failure.reason,
            }),
            Decision::Stop {
                failure_count,
                superseded,
            } => {
                self.cancel_superseded(superseded);
                self.emit(RetryEvent::FailureReported {
                    kind: failure.kind,
                    reason: &failure.reason,
                    failure_count,
                    max_failures,
                });
                self.emit(RetryEvent::Stopped { failure_count });
                self.inner.notifier.notify(Notification::error(
                    "Auto-retry stopped",
                    format!(
                        "Failed {failure_count} times in a row ({}); automatic retries stopped.",
                        failure.reason
                    ),
                ));
            }
            Decision::Retry {
                attempt,
                episode,
                superseded,
            } => {
                self.cancel_superseded(superseded);
                self.emit(RetryEvent::FailureReported {
                    kind: failure.kind,
                    reason: &failure.reason,
                    failure_count: attempt,
                    max_failures,
                });
                self.schedule_retry(attempt, episode);
                let delay = self.inner.trigger.delay();
                self.inner.notifier.notify(Notification::warning(
                    format!("Auto-retry #{attempt}"),
                    format!(
                        "Reason: {}. Retrying in {}s.",
                        failure.reason,
                        delay.as_secs_f64()
                    ),
                ));
            }
        }
    }

    /// Clear all state, as if freshly started. Cancels a pending retry.
    pub fn reset(&self) {
        let pending = {
            let mut st = self.state();
            st.failure_count = 0;
            st.is_handling_failure = false;
            st.stopped = false;
            st.episode += 1;
            st.pending_retry.take()
        };
        if let Some(p) = pending
            && p.handle.cancel()
        {
            self.emit(RetryEvent::RetryCancelled { attempt: p.attempt });
        }
        self.emit(RetryEvent::Reset);
    }

    // ── Retry dispatch ──

    fn schedule_retry(&self, attempt: u32, episode: u64) {
        let this = self.clone();
        let handle = self
            .inner
            .trigger
            .schedule(move |outcome| this.finish_retry(attempt, episode, outcome));

        let Some(handle) = handle else {
            return;
        };
        let stale = {
            let mut st = self.state();
            if st.episode != episode {
                Some(handle)
            } else {
                // A zero delay may already have fired and finished the episode.
                if handle.is_pending() {
                    st.pending_retry = Some(PendingRetry {
                        attempt,
                        episode,
                        handle,
                    });
                }
                None
            }
        };

        match stale {
            Some(handle) => {
                debug!("Episode ended before retry #{attempt} was armed; cancelling");
                if handle.cancel() {
                    self.emit(RetryEvent::RetryCancelled { attempt });
                }
            }
            None => self.emit(RetryEvent::RetryScheduled {
                attempt,
                delay: self.inner.trigger.delay(),
            }),
        }
    }

    fn finish_retry(&self, attempt: u32, episode: u64, outcome: TriggerOutcome) {
        {
            let mut st = self.state();
            if st
                .pending_retry
                .as_ref()
                .is_some_and(|p| p.episode == episode)
            {
                st.pending_retry = None;
            }
            if st.episode == episode && !st.stopped {
                st.is_handling_failure = false;
            }
        }
        match outcome {
            TriggerOutcome::Dispatched => self.emit(RetryEvent::RetryDispatched { attempt }),
            TriggerOutcome::Unavailable(error) => {
                self.emit(RetryEvent::TriggerUnavailable {
                    attempt,
                    error: &error,
                })
            }
        }
    }

    fn cancel_superseded(&self, superseded: Option<PendingRetry>) {
        if let Some(p) = superseded
            && p.handle.cancel()
        {
            self.emit(RetryEvent::RetryCancelled { attempt: p.attempt });
        }
    }

    // ── Queries ──

    pub fn phase(&self) -> RetryPhase {
        self.state().phase()
    }

    pub fn failure_count(&self) -> u32 {
        self.state().failure_count
    }

    pub fn snapshot(&self) -> RetrySnapshot {
        let st = self.state();
        RetrySnapshot {
            phase: st.phase(),
            failure_count: st.failure_count,
            max_failures: self.inner.config.max_failures,
            retry_pending: st.retry_pending(),
        }
    }
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("config", &self.inner.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
