//! Integration tests for the retry guard.
//!
//! These tests start a real axum server on a random port and drive the
//! reqwest-backed transport through [`AutoRetry`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use autoregen::api::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use autoregen::config::RetryConfig;
use autoregen::host::{HostSignal, SignalBus};
use autoregen::retry::{ChannelTrigger, RegenerateCommand, RetryPhase};
use autoregen::ui::{NotifyLevel, ToastQueue};
use autoregen::{AutoRetry, HostBindings};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::sync::mpsc::UnboundedReceiver;

/// Requests to `/api/generate` fail with 500 until `fail_first` have been served.
#[derive(Clone)]
struct Backend {
    hits: Arc<AtomicU32>,
    fail_first: u32,
}

async fn generate(State(backend): State<Backend>) -> (StatusCode, String) {
    let n = backend.hits.fetch_add(1, Ordering::SeqCst);
    if n < backend.fail_first {
        (StatusCode::INTERNAL_SERVER_ERROR, "upstream error".into())
    } else {
        (StatusCode::OK, r#"{"results":[{"text":"ok"}]}"#.into())
    }
}

async fn slow_generate() -> (StatusCode, String) {
    tokio::time::sleep(Duration::from_secs(5)).await;
    (StatusCode::OK, "too late".into())
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Helper: spawn a test backend on port 0 (random available port).
async fn spawn_backend(fail_first: u32) -> (String, Arc<AtomicU32>) {
    let backend = Backend {
        hits: Arc::new(AtomicU32::new(0)),
        fail_first,
    };
    let hits = backend.hits.clone();
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/slow/api/generate", post(slow_generate))
        .route("/api/settings", get(broken))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn config() -> RetryConfig {
    RetryConfig::default()
        .with_max_failures(3)
        .with_retry_delay(Duration::from_millis(50))
        .with_request_timeout(Duration::from_millis(300))
}

struct Harness {
    guard: AutoRetry,
    toasts: ToastQueue,
    trigger: ChannelTrigger,
    commands: UnboundedReceiver<RegenerateCommand>,
}

fn start(config: RetryConfig, bus: Option<&SignalBus>) -> Harness {
    let (trigger, commands) = ChannelTrigger::new();
    let toasts = ToastQueue::new();
    let mut host =
        HostBindings::new(Arc::new(trigger.clone())).with_sink(Arc::new(toasts.clone()));
    if let Some(bus) = bus {
        host = host.with_event_source(bus);
    }
    let guard = AutoRetry::start(config, host).unwrap();
    Harness {
        guard,
        toasts,
        trigger,
        commands,
    }
}

/// Send, then regenerate on every command, until success or stop.
async fn drive(
    h: &mut Harness,
    transport: &impl Transport,
    request: HttpRequest,
) -> Result<HttpResponse, RetryPhase> {
    loop {
        if let Ok(resp) = transport.send(request.clone()).await
            && resp.is_success()
        {
            return Ok(resp);
        }
        let phase = h.guard.coordinator().phase();
        if phase == RetryPhase::Stopped {
            return Err(phase);
        }
        tokio::time::timeout(Duration::from_secs(2), h.commands.recv())
            .await
            .expect("no regenerate command within 2s")
            .expect("trigger dropped");
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn three_failures_stop_after_two_regenerations() {
    let (base, hits) = spawn_backend(10).await;
    let mut h = start(config(), None);
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());

    let outcome = drive(
        &mut h,
        &transport,
        HttpRequest::post_json(format!("{base}/api/generate"), serde_json::json!({})),
    )
    .await;

    assert_eq!(outcome.unwrap_err(), RetryPhase::Stopped);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(h.trigger.sent(), 2);

    // Nothing else fires once stopped.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.trigger.sent(), 2);

    let toasts = h.toasts.drain();
    assert_eq!(toasts.len(), 3);
    assert_eq!(toasts[2].level, NotifyLevel::Error);
    assert!(toasts[2].message.contains("HTTP status 500"));
}

#[tokio::test]
async fn one_failure_then_success_recovers() {
    let (base, hits) = spawn_backend(1).await;
    let mut h = start(config(), None);
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());

    let resp = drive(
        &mut h,
        &transport,
        HttpRequest::post_json(format!("{base}/api/generate"), serde_json::json!({})),
    )
    .await
    .unwrap();

    let value: serde_json::Value = resp.json().unwrap();
    assert_eq!(value["results"][0]["text"], "ok");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(h.guard.coordinator().failure_count(), 0);
    assert_eq!(h.guard.coordinator().phase(), RetryPhase::Idle);

    let toasts = h.toasts.drain();
    assert_eq!(toasts.len(), 2);
    assert_eq!(toasts[1].title, "Retry succeeded");
    assert_eq!(toasts[1].message, "Recovered after 1 attempt.");
}

#[tokio::test]
async fn slow_response_times_out_and_regenerates_once() {
    let (base, _hits) = spawn_backend(0).await;
    let mut h = start(config(), None);
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());

    let err = transport
        .send(HttpRequest::post_json(
            format!("{base}/slow/api/generate"),
            serde_json::json!({}),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::TimedOut(Duration::from_millis(300)));
    assert_eq!(h.guard.coordinator().failure_count(), 1);

    let cmd = tokio::time::timeout(Duration::from_secs(2), h.commands.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cmd.sequence, 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.trigger.sent(), 1);
    assert_eq!(h.toasts.drain().len(), 1);
}

#[tokio::test]
async fn network_error_and_host_signal_count_as_one_incident() {
    // Bind then drop to get a port nothing listens on.
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = dead.local_addr().unwrap();
    drop(dead);

    let bus = SignalBus::default();
    let mut h = start(
        config().with_retry_delay(Duration::from_millis(100)),
        Some(&bus),
    );
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());

    let err = transport
        .send(HttpRequest::post_json(
            format!("http://{addr}/api/generate"),
            serde_json::json!({}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Network(_)));

    bus.emit(HostSignal::UncaughtError {
        message: "TypeError: failed to fetch".into(),
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.guard.coordinator().failure_count(), 1);

    tokio::time::timeout(Duration::from_secs(2), h.commands.recv())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.trigger.sent(), 1);
    assert_eq!(h.toasts.drain().len(), 1);
}

#[tokio::test]
async fn concurrent_failures_count_once() {
    let (base, hits) = spawn_backend(10).await;
    let h = start(config(), None);
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());
    let url = format!("{base}/api/generate");

    let results = futures::future::join_all(
        (0..3).map(|_| transport.send(HttpRequest::post_json(&url, serde_json::json!({})))),
    )
    .await;

    assert!(results.iter().all(|r| r.as_ref().unwrap().status == 500));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(h.guard.coordinator().failure_count(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.trigger.sent(), 1);
}

#[tokio::test]
async fn other_endpoints_pass_through() {
    let (base, _hits) = spawn_backend(0).await;
    let h = start(config(), None);
    let transport = h.guard.wrap(ReqwestTransport::new().unwrap());

    let resp = transport
        .send(HttpRequest::get(format!("{base}/api/settings")))
        .await
        .unwrap();
    assert_eq!(resp.status, 500);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.guard.coordinator().failure_count(), 0);
    assert_eq!(h.trigger.sent(), 0);
    assert!(h.toasts.is_empty());
}
