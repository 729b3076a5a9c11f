//! Waiting for the host before the guard starts.
//!
//! Two shapes of "ready": a host that announces itself with
//! [`HostSignal::Ready`], handled by [`wait_for_ready`], and a host that
//! must be polled, handled by [`await_ready`]. Both give up with an error
//! instead of waiting forever.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::signals::HostSignal;
use crate::api::BackoffConfig;
use crate::config::RetrySettings;

/// Wait up to `timeout` for a `Ready` signal and return its settings.
pub async fn wait_for_ready(
    rx: &mut broadcast::Receiver<HostSignal>,
    timeout: Duration,
) -> Result<RetrySettings, String> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(HostSignal::Ready { settings }) => return Ok(settings),
                Ok(other) => debug!("Ignoring {other:?} while waiting for ready"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {n} signals while waiting for ready");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err("host signal source closed before ready".to_string());
                }
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| format!("host not ready after {}s", timeout.as_secs_f64()))?
}

/// Call `probe` until it succeeds, sleeping per `backoff` between tries.
///
/// Returns the last probe error once `backoff.max_attempts` retries are used up.
pub async fn await_ready<T, F, Fut>(mut probe: F, backoff: &BackoffConfig) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        match probe().await {
            Ok(value) => {
                if attempt > 0 {
                    info!("Host ready after {} probes", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) if attempt < backoff.max_attempts => {
                let delay = backoff.delay_for_attempt(attempt);
                debug!(
                    "Host not ready ({e}); probing again in {:.2}s",
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(format!(
                    "host not ready after {} probes: {e}",
                    attempt + 1
                ));
            }
        }
    }
}
