//! Host lifecycle signals and the task that turns them into failure reports.
//!
//! | Signal | Effect |
//! |--------|--------|
//! | `StreamStopped` | failure: "API stream error" |
//! | `GenerationFailed` | failure: "generation failed" |
//! | `UncaughtError` | failure: "uncaught error" |
//! | `UnhandledRejection` | failure: "unhandled promise rejection" |
//! | `Ready` | informational (see [`readiness`](super::readiness)) |
//! | `ResponseCompleted` | informational |
//!
//! Error signals carry whatever message the host has, but only the generic
//! reason reaches the coordinator; the message is logged.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RetrySettings;
use crate::retry::{Failure, RetryCoordinator};

/// A lifecycle event fired by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostSignal {
    /// The host finished loading and exposes its stored settings.
    Ready { settings: RetrySettings },
    StreamStopped,
    GenerationFailed,
    UncaughtError { message: String },
    UnhandledRejection { message: String },
    ResponseCompleted,
}

impl HostSignal {
    /// The failure this signal represents, if any.
    pub fn as_failure(&self) -> Option<Failure> {
        let reason = match self {
            HostSignal::StreamStopped => "API stream error",
            HostSignal::GenerationFailed => "generation failed",
            HostSignal::UncaughtError { .. } => "uncaught error",
            HostSignal::UnhandledRejection { .. } => "unhandled promise rejection",
            HostSignal::Ready { .. } | HostSignal::ResponseCompleted => return None,
        };
        Some(Failure::external(reason))
    }
}

/// Host capability: a stream of [`HostSignal`]s.
pub trait EventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<HostSignal>;
}

// ── SignalBus ──────────────────────────────────────────────────────

/// In-process [`EventSource`] backed by a broadcast channel.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<HostSignal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a signal. Returns the number of listeners that will see it.
    pub fn emit(&self, signal: HostSignal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventSource for SignalBus {
    fn subscribe(&self) -> broadcast::Receiver<HostSignal> {
        self.tx.subscribe()
    }
}

// ── SignalListener ─────────────────────────────────────────────────

/// Background task forwarding failure signals to a coordinator.
///
/// Ends when the source closes, on [`stop`](Self::stop), or on drop.
pub struct SignalListener {
    task: JoinHandle<()>,
}

impl SignalListener {
    /// Subscribe to `source` and start forwarding. Must be called inside a
    /// tokio runtime.
    pub fn spawn(source: &dyn EventSource, coordinator: RetryCoordinator) -> Self {
        let mut rx = source.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) => dispatch(&coordinator, &signal),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Signal listener lagged by {n} signals; some were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Signal source closed; listener exiting");
        });
        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SignalListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn dispatch(coordinator: &RetryCoordinator, signal: &HostSignal) {
    match signal {
        HostSignal::UncaughtError { message } | HostSignal::UnhandledRejection { message } => {
            warn!("Host reported an error: {message}");
        }
        HostSignal::Ready { .. } => info!("Host signalled ready"),
        HostSignal::ResponseCompleted => debug!("Host completed a response"),
        _ => {}
    }
    if let Some(failure) = signal.as_failure() {
        coordinator.report_failure(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::retry::RetryPhase;
    use crate::retry::coordinator::tests::coordinator;
    use std::time::Duration;

    fn config() -> RetryConfig {
        RetryConfig::default()
            .with_max_failures(3)
            .with_retry_delay(Duration::from_secs(5))
    }

    async fn let_listener_run() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn informational_signals_are_not_failures() {
        assert!(HostSignal::ResponseCompleted.as_failure().is_none());
        assert!(
            HostSignal::Ready {
                settings: RetrySettings::default()
            }
            .as_failure()
            .is_none()
        );
        let f = HostSignal::UncaughtError {
            message: "TypeError: x is undefined".into(),
        }
        .as_failure()
        .unwrap();
        assert_eq!(f.reason, "uncaught error");
    }

    #[test]
    fn signals_deserialize_from_tagged_json() {
        let s: HostSignal = serde_json::from_str(r#"{"type":"generation_failed"}"#).unwrap();
        assert_eq!(s, HostSignal::GenerationFailed);
        let s: HostSignal =
            serde_json::from_str(r#"{"type":"ready","settings":{"max_fails":2}}"#).unwrap();
        assert_eq!(
            s,
            HostSignal::Ready {
                settings: RetrySettings {
                    max_fails: Some(2),
                    ..Default::default()
                }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_signals_reach_coordinator() {
        let (c, rec) = coordinator(config());
        let bus = SignalBus::default();
        let _listener = SignalListener::spawn(&bus, c.clone());

        assert_eq!(bus.emit(HostSignal::GenerationFailed), 1);
        let_listener_run().await;
        assert_eq!(c.failure_count(), 1);
        assert_eq!(c.phase(), RetryPhase::HandlingFailure);
        assert!(rec.notifications()[0].message.contains("generation failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_signals_count_once() {
        let (c, rec) = coordinator(config());
        let bus = SignalBus::default();
        let _listener = SignalListener::spawn(&bus, c.clone());

        bus.emit(HostSignal::StreamStopped);
        bus.emit(HostSignal::UncaughtError {
            message: "boom".into(),
        });
        bus.emit(HostSignal::UnhandledRejection {
            message: "boom".into(),
        });
        let_listener_run().await;
        assert_eq!(c.failure_count(), 1);
        assert_eq!(rec.notifications().len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(rec.triggers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn informational_signals_leave_state_alone() {
        let (c, rec) = coordinator(config());
        let bus = SignalBus::default();
        let _listener = SignalListener::spawn(&bus, c.clone());

        bus.emit(HostSignal::ResponseCompleted);
        bus.emit(HostSignal::Ready {
            settings: RetrySettings::default(),
        });
        let_listener_run().await;
        assert_eq!(c.failure_count(), 0);
        assert!(rec.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_listener_ignores_signals() {
        let (c, _rec) = coordinator(config());
        let bus = SignalBus::default();
        let listener = SignalListener::spawn(&bus, c.clone());
        listener.stop();
        let_listener_run().await;

        bus.emit(HostSignal::GenerationFailed);
        let_listener_run().await;
        assert!(listener.is_finished());
        assert_eq!(c.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_exits_when_bus_dropped() {
        let (c, _rec) = coordinator(config());
        let bus = SignalBus::default();
        let listener = SignalListener::spawn(&bus, c);
        drop(bus);
        let_listener_run().await;
        assert!(listener.is_finished());
    }
}
