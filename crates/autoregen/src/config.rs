//! Retry configuration: the host-facing settings shape and the validated,
//! immutable [`RetryConfig`] the coordinator runs on.
//!
//! Settings arrive as JSON (from a settings file or from the host once it
//! signals readiness). Every field is optional; missing, zero, or empty
//! values fall back to the defaults below.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "max_fails": 3,
//!   "retry_delay": 2000,
//!   "request_timeout": 60000,
//!   "target_api_url": "/api/backends/chat-completions/generate"
//! }
//! ```

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of consecutive failures before retrying stops.
pub const DEFAULT_MAX_FAILURES: u32 = 4;

/// Default delay between a failure and the regenerate action, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Default deadline for a single matching request, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 160_000;

/// Default path fragment identifying the generation endpoint.
pub const DEFAULT_TARGET_PATH: &str = "/api/generate";

/// Base used to resolve relative request URLs before path matching.
const RELATIVE_BASE: &str = "http://localhost/";

// ── TargetMatcher ──────────────────────────────────────────────────

/// Predicate over request URLs selecting the one endpoint the guard watches.
///
/// A URL matches when its path contains the configured fragment. Relative
/// URLs (`/api/generate?x=1`) are resolved against a dummy origin first, so
/// hosts that pass paths instead of absolute URLs behave the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatcher {
    fragment: String,
}

impl TargetMatcher {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }

    /// The path fragment being matched.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Whether `url` targets the watched endpoint. Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        let parsed = Url::parse(url).or_else(|_| {
            Url::parse(RELATIVE_BASE).and_then(|base| base.join(url))
        });
        match parsed {
            Ok(u) => u.path().contains(&self.fragment),
            Err(_) => false,
        }
    }
}

impl Default for TargetMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_PATH)
    }
}

// ── RetryConfig ────────────────────────────────────────────────────

/// Validated retry configuration. Immutable once handed to a coordinator.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Consecutive failure episodes after which retrying stops (≥ 1).
    pub max_failures: u32,
    /// Delay between a failure report and the regenerate action.
    pub retry_delay: Duration,
    /// Deadline for each matching request (> 0).
    pub request_timeout: Duration,
    /// Which requests participate in the state machine.
    pub target: TargetMatcher,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            target: TargetMatcher::default(),
        }
    }
}

impl RetryConfig {
    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_failures = max;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_target(mut self, fragment: impl Into<String>) -> Self {
        self.target = TargetMatcher::new(fragment);
        self
    }

    /// Check the invariants the coordinator relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_failures == 0 {
            return Err("max_failures must be at least 1".to_string());
        }
        if self.request_timeout.is_zero() {
            return Err("request_timeout must be greater than zero".to_string());
        }
        if self.target.fragment().is_empty() {
            return Err("target path must not be empty".to_string());
        }
        Ok(())
    }

    /// One-line summary for startup logging.
    pub fn to_log_string(&self) -> String {
        format!(
            "max_failures={}, retry_delay={}ms, request_timeout={}ms, target={}",
            self.max_failures,
            self.retry_delay.as_millis(),
            self.request_timeout.as_millis(),
            self.target.fragment(),
        )
    }
}

// ── RetrySettings ──────────────────────────────────────────────────

/// Settings as stored by the host. Durations are milliseconds.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RetrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fails: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_api_url: Option<String>,
}

impl RetrySettings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read settings file '{}': {e}", path.display()))?;
        Self::from_json(&content)
            .map_err(|e| format!("invalid settings file '{}': {e}", path.display()))
    }

    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("failed to parse settings: {e}"))
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge(self, other: RetrySettings) -> Self {
        Self {
            max_fails: other.max_fails.or(self.max_fails),
            retry_delay: other.retry_delay.or(self.retry_delay),
            request_timeout: other.request_timeout.or(self.request_timeout),
            target_api_url: other.target_api_url.or(self.target_api_url),
        }
    }

    /// Resolve defaults and validate.
    ///
    /// Zero and empty values are treated as unset, matching hosts that store
    /// `0` / `""` for "use the default".
    pub fn into_config(self) -> Result<RetryConfig, String> {
        let max_failures = self
            .max_fails
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_FAILURES);
        let retry_delay = self
            .retry_delay
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let request_timeout = self
            .request_timeout
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let target = self
            .target_api_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_PATH.to_string());

        let config = RetryConfig {
            max_failures,
            retry_delay: Duration::from_millis(retry_delay),
            request_timeout: Duration::from_millis(request_timeout),
            target: TargetMatcher::new(target),
        };
        config.validate()?;
        Ok(config)
    }
}
