//! The regenerate action and its delayed, single-shot dispatch.
//!
//! [`ActionTrigger`] is the host capability: something that makes the
//! underlying system issue the failed request again (press "regenerate",
//! post a command to a driver loop, ...). [`RetryTrigger`] wraps it with the
//! configured delay and turns every way it can fail into a
//! [`TriggerOutcome`] instead of an error, so a missing or disabled control
//! can never leave the coordinator locked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::timer::{Timer, TimerHandle};

/// Host capability that re-issues the watched request.
pub trait ActionTrigger: Send + Sync {
    /// Whether the action can run right now (control present and enabled).
    fn is_available(&self) -> bool {
        true
    }

    /// Perform the action once.
    fn regenerate(&self) -> Result<(), String>;
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The action ran.
    Dispatched,
    /// The action was absent, disabled, or failed.
    Unavailable(String),
}

/// Schedules an [`ActionTrigger`] after a fixed delay.
#[derive(Clone)]
pub struct RetryTrigger {
    action: Arc<dyn ActionTrigger>,
    delay: Duration,
    timer: Timer,
}

impl RetryTrigger {
    pub fn new(action: Arc<dyn ActionTrigger>, delay: Duration, timer: Timer) -> Self {
        Self {
            action,
            delay,
            timer,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run the action now, checking availability first.
    pub fn fire(&self) -> TriggerOutcome {
        if !self.action.is_available() {
            error!("Regenerate action unavailable (missing or disabled)");
            return TriggerOutcome::Unavailable("regenerate action unavailable".to_string());
        }
        match self.action.regenerate() {
            Ok(()) => {
                debug!("Regenerate action invoked");
                TriggerOutcome::Dispatched
            }
            Err(e) => {
                error!("Regenerate action failed: {e}");
                TriggerOutcome::Unavailable(e)
            }
        }
    }

    /// Fire after the delay and hand the outcome to `on_done`.
    ///
    /// When the action is already unavailable nothing is scheduled:
    /// `on_done` runs immediately with [`TriggerOutcome::Unavailable`] and
    /// `None` is returned.
    pub fn schedule<F>(&self, on_done: F) -> Option<TimerHandle>
    where
        F: FnOnce(TriggerOutcome) + Send + 'static,
    {
        if !self.action.is_available() {
            error!("Regenerate action unavailable; not scheduling a retry");
            on_done(TriggerOutcome::Unavailable(
                "regenerate action unavailable".to_string(),
            ));
            return None;
        }
        let this = self.clone();
        Some(self.timer.schedule(self.delay, move || on_done(this.fire())))
    }
}

// ── Implementations ────────────────────────────────────────────────

/// Trigger backed by a closure.
pub struct FnTrigger<F>(F)
where
    F: Fn() -> Result<(), String> + Send + Sync;

impl<F> FnTrigger<F>
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ActionTrigger for FnTrigger<F>
where
    F: Fn() -> Result<(), String> + Send + Sync,
{
    fn regenerate(&self) -> Result<(), String> {
        (self.0)()
    }
}

/// Command delivered by a [`ChannelTrigger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenerateCommand {
    /// Sequence number of this command, starting at 1.
    pub sequence: u64,
}

/// Trigger that posts [`RegenerateCommand`]s to a driver loop.
///
/// Available while the receiving side is alive and the trigger is enabled.
/// Disable it while a request is in flight to mirror a greyed-out
/// regenerate button.
#[derive(Clone)]
pub struct ChannelTrigger {
    tx: mpsc::UnboundedSender<RegenerateCommand>,
    enabled: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
}

impl ChannelTrigger {
    /// Create a trigger and the receiver the driver loop reads from.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RegenerateCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                enabled: Arc::new(AtomicBool::new(true)),
                sent: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Number of commands delivered so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Acquire)
    }
}

impl ActionTrigger for ChannelTrigger {
    fn is_available(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn regenerate(&self) -> Result<(), String> {
        let sequence = self.sent.fetch_add(1, Ordering::AcqRel) + 1;
        self.tx
            .send(RegenerateCommand { sequence })
            .map_err(|_| "regenerate receiver dropped".to_string())
    }
}
