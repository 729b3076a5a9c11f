//! Mutable retry state and its observable phase.

use serde::Serialize;

use crate::timer::TimerHandle;

/// Coordinator phase, derived from [`RetryState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPhase {
    /// No failure is being handled.
    Idle,
    /// A failure episode is in progress; further failure reports are dropped.
    HandlingFailure,
    /// The failure limit was reached. Only a success or a reset leaves it.
    Stopped,
}

/// State owned by one [`RetryCoordinator`](super::RetryCoordinator).
///
/// `failure_count` moves by exactly one per episode, never per report.
/// `episode` identifies the episode a scheduled retry belongs to, so a
/// late dispatch cannot release a lock taken by a newer episode.
#[derive(Debug, Default)]
pub struct RetryState {
    pub failure_count: u32,
    pub is_handling_failure: bool,
    pub stopped: bool,
    pub episode: u64,
    pub pending_retry: Option<PendingRetry>,
}

/// A retry waiting on its delay timer.
#[derive(Debug)]
pub struct PendingRetry {
    pub attempt: u32,
    pub episode: u64,
    pub handle: TimerHandle,
}

impl RetryState {
    pub fn phase(&self) -> RetryPhase {
        if self.stopped {
            RetryPhase::Stopped
        } else if self.is_handling_failure {
            RetryPhase::HandlingFailure
        } else {
            RetryPhase::Idle
        }
    }

    /// Whether a scheduled retry has not fired yet.
    pub fn retry_pending(&self) -> bool {
        self.pending_retry
            .as_ref()
            .is_some_and(|p| p.handle.is_pending())
    }
}

/// Point-in-time view of the coordinator, safe to hand to a UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RetrySnapshot {
    pub phase: RetryPhase,
    pub failure_count: u32,
    pub max_failures: u32,
    pub retry_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle() {
        let state = RetryState::default();
        assert_eq!(state.phase(), RetryPhase::Idle);
        assert_eq!(state.failure_count, 0);
    }

    #[test]
    fn stopped_wins_over_lock() {
        let state = RetryState {
            is_handling_failure: true,
            stopped: true,
            ..Default::default()
        };
        assert_eq!(state.phase(), RetryPhase::Stopped);
    }

    #[test]
    fn snapshot_serializes_phase_snake_case() {
        let snap = RetrySnapshot {
            phase: RetryPhase::HandlingFailure,
            failure_count: 2,
            max_failures: 4,
            retry_pending: true,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["phase"], "handling_failure");
        assert_eq!(json["failure_count"], 2);
    }
}
