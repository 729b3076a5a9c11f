//! HTTP plumbing around the watched endpoint.
//!
//! | Module | Role |
//! |--------|------|
//! | [`transport`] | [`Transport`] trait, request/response types, reqwest backend |
//! | [`interceptor`] | Per-request deadline and outcome classification |
//! | [`observe`] | Passive completion hooks |
//! | [`backoff`] | Probe pacing for host readiness |
//!
//! A typical stack is `Observed<Intercepted<ReqwestTransport>>`: the
//! interceptor sees every outcome first, then observers see completed
//! responses.

pub mod backoff;
pub mod interceptor;
pub mod observe;
pub mod transport;

pub use backoff::BackoffConfig;
pub use interceptor::{Intercepted, PendingRequest, RequestInterceptor};
pub use observe::{CompletionObserver, FnObserver, LoggingObserver, Observed};
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError, TransportFuture,
};
