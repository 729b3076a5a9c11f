//! Passive completion hooks.
//!
//! An [`Observed`] transport hands every completed matching exchange to a
//! [`CompletionObserver`] before returning it. Observers see the response
//! but cannot change it, and they never feed the retry coordinator.

use std::sync::Arc;
use tracing::{debug, trace};

use super::transport::{HttpRequest, HttpResponse, Transport, TransportFuture};
use crate::config::TargetMatcher;

/// Receives each completed response from the watched endpoint.
pub trait CompletionObserver: Send + Sync {
    fn on_completion(&self, url: &str, response: &HttpResponse);
}

/// Logs response size at debug level and the body at trace level.
pub struct LoggingObserver;

impl CompletionObserver for LoggingObserver {
    fn on_completion(&self, url: &str, response: &HttpResponse) {
        debug!(
            "Completed {url}: HTTP {} ({} bytes)",
            response.status,
            response.body.len()
        );
        trace!("Response payload: {}", response.body);
    }
}

/// Adapter for closures.
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(&str, &HttpResponse) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> CompletionObserver for FnObserver<F>
where
    F: Fn(&str, &HttpResponse) + Send + Sync,
{
    fn on_completion(&self, url: &str, response: &HttpResponse) {
        (self.0)(url, response)
    }
}

/// [`Transport`] decorator feeding matching responses to an observer.
pub struct Observed<T> {
    inner: T,
    target: TargetMatcher,
    observer: Arc<dyn CompletionObserver>,
}

impl<T: Transport> Observed<T> {
    pub fn new(inner: T, target: TargetMatcher, observer: Arc<dyn CompletionObserver>) -> Self {
        Self {
            inner,
            target,
            observer,
        }
    }
}

impl<T: Transport> Transport for Observed<T> {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
        Box::pin(async move {
            let watched = self.target.matches(&request.url).then(|| request.url.clone());
            let resp = self.inner.send(request).await?;
            if let Some(url) = watched {
                self.observer.on_completion(&url, &resp);
            }
            Ok(resp)
        })
    }
}
