//! Automatic regenerate-on-failure guard for one generation endpoint.
//!
//! `autoregen` sits between an application and the endpoint it keeps
//! calling. Every matching request gets a deadline; every outcome
//! (HTTP status, transport error, timeout, or a failure signal from the
//! host) is reported to a single [`RetryCoordinator`](retry::RetryCoordinator),
//! which asks the host to regenerate after a fixed delay. Overlapping
//! reports from the same incident count once, and retrying stops after a
//! bounded number of consecutive failures until the next success.
//!
//! # Getting started
//!
//! ```ignore
//! use autoregen::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = RetrySettings::load("autoregen.json")?.into_config()?;
//!
//!     // The host decides what "regenerate" means; here, a driver loop.
//!     let (trigger, mut commands) = ChannelTrigger::new();
//!     let toasts = ToastQueue::new();
//!
//!     let guard = AutoRetry::start(
//!         config,
//!         HostBindings::new(Arc::new(trigger)).with_sink(Arc::new(toasts.clone())),
//!     )?;
//!     let transport = guard.wrap(ReqwestTransport::new()?);
//!
//!     let request = HttpRequest::post_json(
//!         "http://127.0.0.1:5000/api/generate",
//!         serde_json::json!({ "prompt": "Once upon a time" }),
//!     );
//!     loop {
//!         if let Ok(resp) = transport.send(request.clone()).await
//!             && resp.is_success()
//!         {
//!             println!("{}", resp.body);
//!             break;
//!         }
//!         if guard.coordinator().phase() == RetryPhase::Stopped {
//!             return Err("gave up".into());
//!         }
//!         commands.recv().await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`retry`] | Coordinator state machine, failure taxonomy, delayed trigger, events |
//! | [`api`] | [`Transport`](api::Transport) seam, interceptor, observers, backoff |
//! | [`host`] | Host signal bus, signal listener, readiness waits |
//! | [`ui`] | Notifications with logging fallback, toast queue |
//! | [`config`] | [`RetryConfig`](config::RetryConfig) and on-disk [`RetrySettings`](config::RetrySettings) |
//! | [`timer`] | Cancellable delayed actions on the tokio runtime |
//! | [`guard`] | [`AutoRetry`](guard::AutoRetry), which wires it all together |

pub mod api;
pub mod config;
pub mod guard;
pub mod host;
pub mod prelude;
pub mod retry;
pub mod timer;
pub mod ui;

pub use guard::{AutoRetry, HostBindings};
