//! Failure taxonomy.
//!
//! Every failure, whatever its source, becomes a [`Failure`]: a
//! [`FailureKind`] plus a human-readable reason. The coordinator treats all
//! kinds identically for state transitions; the kind only shapes
//! notification text and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a failure was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network-level error (connection refused, reset, DNS, ...).
    TransportFailure,
    /// The request deadline elapsed before a response arrived.
    Timeout,
    /// The endpoint answered with a non-success status.
    ApplicationFailure,
    /// The host reported a failure whose cause was not observed directly.
    ExternalSignalFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TransportFailure => write!(f, "transport failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ApplicationFailure => write!(f, "application failure"),
            FailureKind::ExternalSignalFailure => write!(f, "external signal"),
        }
    }
}

/// A single failure report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TransportFailure, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("timeout after {}s", after.as_secs_f64()),
        )
    }

    pub fn status(status: u16) -> Self {
        Self::new(FailureKind::ApplicationFailure, format!("HTTP status {status}"))
    }

    pub fn external(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::ExternalSignalFailure, reason)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason, self.kind)
    }
}
