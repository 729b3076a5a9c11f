//! Exponential backoff for polling the host until it is ready.
//!
//! This is unrelated to the regenerate retry cycle, which always waits a
//! fixed `retry_delay`. Backoff only paces readiness probes.

use std::time::Duration;

/// Backoff schedule for repeated probes.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Probes after the first one (0 = probe once).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Shorten each delay by a fixed per-attempt factor.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay before probe `attempt + 1` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        let capped = base.min(self.max_delay.as_secs_f64());

        let secs = if self.jitter {
            // Deterministic so tests running on paused time stay reproducible.
            capped * [0.75, 0.90, 0.60, 0.85][(attempt % 4) as usize]
        } else {
            capped
        };
        // Negative or NaN products come from a bad multiplier; fall back to the cap.
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }

    /// Sum of every delay in the schedule.
    pub fn total_wait(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for_attempt(a)).sum()
    }
}
