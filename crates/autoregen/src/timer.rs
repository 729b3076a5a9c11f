//! Delayed actions and cancellable timeouts on the tokio clock.
//!
//! [`Timer::schedule`] runs a closure once after a delay and returns a
//! [`TimerHandle`]. Firing and cancelling race on a single atomic, so
//! exactly one of them wins: a cancelled timer never runs its action, and
//! cancelling an already-fired timer is a harmless no-op.
//!
//! Must be called from within a tokio runtime. Tests pause the clock with
//! `#[tokio::test(start_paused = true)]` and let it auto-advance.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::trace;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Tokio-backed timer service.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer;

impl Timer {
    pub fn new() -> Self {
        Self
    }

    /// Run `action` once after `delay` unless the returned handle is
    /// cancelled first.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(PENDING));
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_state
                .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                trace!("Timer fired after {}ms", delay.as_millis());
                action();
            }
        });
        TimerHandle {
            state,
            abort: task.abort_handle(),
        }
    }
}

/// Handle to a scheduled action. Dropping it does not cancel the action.
#[derive(Debug)]
pub struct TimerHandle {
    state: Arc<AtomicU8>,
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancel the timer.
    ///
    /// Returns `true` if this call prevented the action from running,
    /// `false` if it had already fired or been cancelled. Idempotent.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.abort.abort();
        }
        won
    }

    /// Whether the action has run (or is running).
    pub fn has_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    /// Whether the timer is still waiting.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        let handle = Timer::new().schedule(Duration::from_secs(5), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(handle.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_action() {
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        let handle = Timer::new().schedule(Duration::from_secs(1), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.cancel());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!handle.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let handle = Timer::new().schedule(Duration::from_secs(1), || {});
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_reports_false() {
        let handle = Timer::new().schedule(Duration::from_millis(10), || {});
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.has_fired());
        assert!(!handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_fires_promptly() {
        let hits = Arc::new(AtomicU32::new(0));
        let h = hits.clone();
        Timer::new().schedule(Duration::ZERO, move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
