//! The request-handling seam.
//!
//! [`Transport`] is the one interface every layer in this crate speaks:
//! the reqwest-backed [`ReqwestTransport`] at the bottom, and decorators
//! such as [`Intercepted`](super::interceptor::Intercepted) and
//! [`Observed`](super::observe::Observed) stacked on top of it.

use reqwest::Method;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>>;

// ── Request / response ─────────────────────────────────────────────

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A completed HTTP exchange. Any status, including errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_str(&self.body).map_err(|e| format!("failed to parse response: {e}"))
    }
}

/// Why a request produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, DNS, TLS, or body-read failure.
    Network(String),
    /// The deadline elapsed and the request was cancelled.
    TimedOut(Duration),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "{msg}"),
            TransportError::TimedOut(after) => {
                write!(f, "request timed out after {}s", after.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for TransportError {}

// ── Transport trait ────────────────────────────────────────────────

/// Sends [`HttpRequest`]s.
///
/// Uses a boxed future so that the trait is dyn-compatible and decorators
/// can wrap any implementation.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        (**self).send(request)
    }
}

// ── reqwest ────────────────────────────────────────────────────────

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// No overall request timeout is set on the client: deadlines belong to the
/// interceptor, which also reports them.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autoregen/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            debug!("HTTP {} {}", request.method, request.url);
            let start = Instant::now();

            let mut builder = self.client.request(request.method, request.url.as_str());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                trace!(
                    "Request payload size: {} bytes",
                    serde_json::to_string(body).map_or(0, |s| s.len())
                );
                builder = builder.json(body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| TransportError::Network(format!("request failed: {e}")))?;
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;

            debug!(
                "HTTP {status} in {:.1}s ({} bytes)",
                start.elapsed().as_secs_f64(),
                body.len()
            );
            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }

    #[test]
    fn json_body_parses() {
        let resp = HttpResponse::new(200, r#"{"results":[{"text":"hi"}]}"#);
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["results"][0]["text"], "hi");
        assert!(HttpResponse::new(200, "not json").json::<serde_json::Value>().is_err());
    }

    #[test]
    fn request_builders() {
        let req = HttpRequest::post_json("/api/generate", serde_json::json!({"prompt": "x"}))
            .with_header("X-Test", "1");
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.headers, vec![("X-Test".to_string(), "1".to_string())]);
        assert!(HttpRequest::get("/").body.is_none());
    }

    #[test]
    fn timed_out_display() {
        let err = TransportError::TimedOut(Duration::from_secs(3));
        assert_eq!(err.to_string(), "request timed out after 3s");
    }
}
