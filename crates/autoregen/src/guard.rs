//! Top-level wiring: one [`AutoRetry`] per watched host.
//!
//! ```ignore
//! let (trigger, mut commands) = ChannelTrigger::new();
//! let bus = SignalBus::default();
//! let guard = AutoRetry::start(
//!     config,
//!     HostBindings::new(Arc::new(trigger)).with_event_source(&bus),
//! )?;
//! let transport = guard.wrap(ReqwestTransport::new()?);
//! ```

use std::sync::Arc;
use tracing::info;

use crate::api::{Intercepted, RequestInterceptor, Transport};
use crate::config::RetryConfig;
use crate::host::{EventSource, SignalListener};
use crate::retry::{ActionTrigger, EventHandler, LoggingHandler, RetryCoordinator};
use crate::ui::{NotificationSink, Notifier};

/// Host capabilities handed to [`AutoRetry::start`].
pub struct HostBindings<'a> {
    trigger: Arc<dyn ActionTrigger>,
    sink: Option<Arc<dyn NotificationSink>>,
    source: Option<&'a dyn EventSource>,
    events: Option<Arc<dyn EventHandler>>,
}

impl<'a> HostBindings<'a> {
    pub fn new(trigger: Arc<dyn ActionTrigger>) -> Self {
        Self {
            trigger,
            sink: None,
            source: None,
            events: None,
        }
    }

    /// Without a sink, notifications are only logged.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_event_source(mut self, source: &'a dyn EventSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Replaces the default [`LoggingHandler`].
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = Some(handler);
        self
    }
}

/// A running retry guard.
///
/// Dropping it stops the signal listener; a retry already scheduled may
/// still fire.
pub struct AutoRetry {
    coordinator: RetryCoordinator,
    interceptor: RequestInterceptor,
    listener: Option<SignalListener>,
}

impl AutoRetry {
    /// Build the coordinator and subscribe to host signals.
    ///
    /// Must be called inside a tokio runtime when an event source is bound.
    pub fn start(config: RetryConfig, host: HostBindings<'_>) -> Result<Self, String> {
        let notifier = match host.sink {
            Some(sink) => Notifier::with_sink(sink),
            None => Notifier::logging_only(),
        };
        let events = host.events.unwrap_or_else(|| Arc::new(LoggingHandler));
        let coordinator = RetryCoordinator::builder(config, host.trigger)
            .notifier(notifier)
            .event_handler(events)
            .build()?;

        let listener = host
            .source
            .map(|source| SignalListener::spawn(source, coordinator.clone()));

        info!(
            "Auto-retry enabled: {}",
            coordinator.config().to_log_string()
        );
        Ok(Self {
            interceptor: RequestInterceptor::new(coordinator.clone()),
            coordinator,
            listener,
        })
    }

    pub fn coordinator(&self) -> &RetryCoordinator {
        &self.coordinator
    }

    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }

    /// Put `transport` behind this guard's interceptor.
    pub fn wrap<T: Transport>(&self, transport: T) -> Intercepted<T> {
        Intercepted::new(transport, self.interceptor.clone())
    }

    /// Stop listening for signals and cancel any pending retry.
    pub fn shutdown(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.stop();
        }
        self.coordinator.reset();
        info!("Auto-retry disabled");
    }
}
