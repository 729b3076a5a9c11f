//! Deadline and outcome classification for the watched endpoint.
//!
//! [`RequestInterceptor`] is the hook-style API: call
//! [`before_send`](RequestInterceptor::before_send) for every outgoing
//! request, then resolve the returned [`PendingRequest`] exactly once with
//! the response status or the error. [`Intercepted`] packages the same
//! lifecycle as a [`Transport`] decorator.
//!
//! Requests whose URL does not match the configured target get no pending
//! context and cause no side effect at all.
//!
//! A pending request settles at most once. Whichever comes first of
//! response, error, and deadline reports to the coordinator; the others are
//! no-ops. The deadline timer is cancelled on every resolution path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError, TransportFuture};
use crate::retry::{Failure, RetryCoordinator};
use crate::timer::{Timer, TimerHandle};

// ── RequestInterceptor ─────────────────────────────────────────────

/// Attaches deadlines to matching requests and reports their outcomes.
#[derive(Clone, Debug)]
pub struct RequestInterceptor {
    coordinator: RetryCoordinator,
    timer: Timer,
}

impl RequestInterceptor {
    pub fn new(coordinator: RetryCoordinator) -> Self {
        Self {
            coordinator,
            timer: Timer::new(),
        }
    }

    pub fn coordinator(&self) -> &RetryCoordinator {
        &self.coordinator
    }

    /// Whether `url` is the watched endpoint.
    pub fn matches(&self, url: &str) -> bool {
        self.coordinator.config().target.matches(url)
    }

    /// Register an outgoing request.
    ///
    /// Returns `None` for non-matching URLs. For matching URLs the failure
    /// lock is released and a deadline of `request_timeout` starts.
    pub fn before_send(&self, url: &str) -> Option<PendingRequest> {
        if !self.matches(url) {
            return None;
        }
        debug!("Matching request to {url}; releasing failure lock");
        self.coordinator.begin_request();

        let timeout = self.coordinator.config().request_timeout;
        let shared = Arc::new(PendingShared {
            settled: AtomicBool::new(false),
            expired: Notify::new(),
            coordinator: self.coordinator.clone(),
            url: url.to_string(),
            timeout,
        });
        let on_deadline = shared.clone();
        let deadline = self.timer.schedule(timeout, move || {
            if on_deadline.try_settle() {
                warn!(
                    "Request to {} exceeded {}s; cancelling",
                    on_deadline.url,
                    on_deadline.timeout.as_secs_f64()
                );
                on_deadline
                    .coordinator
                    .report_failure(Failure::timeout(on_deadline.timeout));
            }
            on_deadline.expired.notify_one();
        });

        Some(PendingRequest { shared, deadline })
    }
}

// ── PendingRequest ─────────────────────────────────────────────────

struct PendingShared {
    settled: AtomicBool,
    expired: Notify,
    coordinator: RetryCoordinator,
    url: String,
    timeout: Duration,
}

impl PendingShared {
    /// Claim the single resolution. `true` for the first caller only.
    fn try_settle(&self) -> bool {
        !self.settled.swap(true, Ordering::AcqRel)
    }
}

/// One in-flight matching request.
///
/// Dropping it unresolved cancels the deadline without reporting anything.
pub struct PendingRequest {
    shared: Arc<PendingShared>,
    deadline: TimerHandle,
}

impl PendingRequest {
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Whether the outcome has already been reported.
    pub fn is_settled(&self) -> bool {
        self.shared.settled.load(Ordering::Acquire)
    }

    /// Resolves once the deadline fires. Never resolves if the request
    /// settles first.
    pub async fn expired(&self) {
        self.shared.expired.notified().await;
    }

    /// A response arrived. 2xx is a success; anything else a failure.
    pub fn on_response(&self, status: u16) {
        debug!("Intercepted {}: HTTP {status}", self.shared.url);
        if (200..300).contains(&status) {
            self.on_success();
        } else {
            self.on_failure(Failure::status(status));
        }
    }

    /// The request failed without a response.
    pub fn on_error(&self, error: &TransportError) {
        let failure = match error {
            TransportError::TimedOut(after) => Failure::timeout(*after),
            TransportError::Network(msg) => {
                warn!("Request to {} failed: {msg}", self.shared.url);
                Failure::transport(msg.clone())
            }
        };
        self.on_failure(failure);
    }

    /// Report success unless already settled.
    pub fn on_success(&self) {
        self.settle_with(None);
    }

    /// Report `failure` unless already settled.
    pub fn on_failure(&self, failure: Failure) {
        self.settle_with(Some(failure));
    }

    fn settle_with(&self, failure: Option<Failure>) {
        self.deadline.cancel();
        if !self.shared.try_settle() {
            debug!("Request to {} already settled; ignoring", self.shared.url);
            return;
        }
        match failure {
            None => self.shared.coordinator.report_success(),
            Some(f) => self.shared.coordinator.report_failure(f),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.deadline.cancel();
    }
}

// ── Intercepted ────────────────────────────────────────────────────

/// [`Transport`] decorator that runs every request through a
/// [`RequestInterceptor`].
///
/// On deadline the inner request future is dropped, which cancels the
/// underlying HTTP call, and [`TransportError::TimedOut`] is returned.
pub struct Intercepted<T> {
    inner: T,
    interceptor: RequestInterceptor,
}

impl<T: Transport> Intercepted<T> {
    pub fn new(inner: T, interceptor: RequestInterceptor) -> Self {
        Self { inner, interceptor }
    }

    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for Intercepted<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let Some(pending) = self.interceptor.before_send(&request.url) else {
                return self.inner.send(request).await;
            };

            let result: Result<HttpResponse, TransportError> = tokio::select! {
                res = self.inner.send(request) => res,
                _ = pending.expired() => Err(TransportError::TimedOut(pending.timeout())),
            };

            match &result {
                Ok(resp) => pending.on_response(resp.status),
                Err(e) => pending.on_error(e),
            }
            result
        })
    }
}
