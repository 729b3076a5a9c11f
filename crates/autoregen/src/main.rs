//! Post to a generation endpoint and regenerate automatically on failure.
//!
//! Failed attempts (error status, network error, or timeout) are retried
//! after `--retry-delay` until one succeeds or `--max-fails` consecutive
//! attempts have failed. Notifications go to stderr; the successful
//! response body goes to stdout.
//!
//! `--url` must match the watched target (`--target`, default
//! `/api/generate`); anything else is rejected before the first request.
//!
//! Log verbosity is read from `AUTOREGEN_LOG` (default `info`).
//!
//! # Examples
//!
//! ```sh
//! # Simple prompt
//! autoregen --url http://127.0.0.1:5000/api/generate --prompt "Once upon a time"
//!
//! # Full request body and host settings file, overriding the delay
//! autoregen --url http://127.0.0.1:5000/api/generate \
//!   --body request.json --settings autoregen.json --retry-delay 2000
//!
//! # Wait for the backend to come up first
//! autoregen --url http://127.0.0.1:5000/api/generate --prompt "hi" --wait-ready
//! ```

use std::process;
use std::sync::Arc;

use autoregen::api::{
    BackoffConfig, HttpRequest, LoggingObserver, Observed, ReqwestTransport, Transport,
};
use autoregen::config::{RetryConfig, RetrySettings};
use autoregen::host::await_ready;
use autoregen::retry::{ChannelTrigger, RetryPhase};
use autoregen::ui::ToastQueue;
use autoregen::{AutoRetry, HostBindings};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Post to a generation endpoint and regenerate automatically on failure.
#[derive(Parser)]
#[command(name = "autoregen")]
struct Cli {
    /// Endpoint to post to
    #[arg(long)]
    url: String,

    // ── Request body ───────────────────────────────────────────
    /// JSON file holding the full request body
    #[arg(long, conflicts_with = "prompt")]
    body: Option<String>,

    /// Prompt text, sent as {"prompt": ...}
    #[arg(long)]
    prompt: Option<String>,

    // ── Retry settings ─────────────────────────────────────────
    /// JSON settings file (max_fails, retry_delay, request_timeout, target_api_url)
    #[arg(long)]
    settings: Option<String>,

    /// Consecutive failures before giving up
    #[arg(long)]
    max_fails: Option<u32>,

    /// Delay before each regeneration, in milliseconds
    #[arg(long)]
    retry_delay: Option<u64>,

    /// Deadline for each attempt, in milliseconds
    #[arg(long)]
    request_timeout: Option<u64>,

    /// Path fragment identifying the watched endpoint
    #[arg(long)]
    target: Option<String>,

    /// Poll the endpoint with backoff until it answers before posting
    #[arg(long)]
    wait_ready: bool,
}

impl Cli {
    fn settings(&self) -> Result<RetrySettings, String> {
        let base = match &self.settings {
            Some(path) => RetrySettings::load(path)?,
            None => RetrySettings::default(),
        };
        Ok(base.merge(RetrySettings {
            max_fails: self.max_fails,
            retry_delay: self.retry_delay,
            request_timeout: self.request_timeout,
            target_api_url: self.target.clone(),
        }))
    }

    fn request(&self) -> Result<HttpRequest, String> {
        let body = match (&self.body, &self.prompt) {
            (Some(path), _) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| format!("failed to read body file '{path}': {e}"))?;
                serde_json::from_str(&content)
                    .map_err(|e| format!("invalid JSON in body file '{path}': {e}"))?
            }
            (None, Some(prompt)) => serde_json::json!({ "prompt": prompt }),
            (None, None) => return Err("one of --body or --prompt is required".to_string()),
        };
        Ok(HttpRequest::post_json(&self.url, body))
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("AUTOREGEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_toasts(toasts: &ToastQueue) {
    for toast in toasts.drain() {
        eprintln!("{}", toast.to_line());
    }
}

/// Failures on an unwatched URL never produce a regenerate command, so the
/// drive loop would wait forever.
fn ensure_watched(config: &RetryConfig, url: &str) -> Result<(), String> {
    if config.target.matches(url) {
        return Ok(());
    }
    warn!("{url} does not match target '{}'", config.target.fragment());
    Err(format!(
        "--url {url} is not watched (target '{}'); pass a matching --target",
        config.target.fragment()
    ))
}

async fn run(cli: &Cli) -> Result<String, String> {
    let config = cli.settings()?.into_config()?;
    let request = cli.request()?;
    ensure_watched(&config, &cli.url)?;

    let http = ReqwestTransport::new()?;
    if cli.wait_ready {
        let probe = HttpRequest::get(&cli.url);
        let client = &http;
        await_ready(
            move || {
                let probe = probe.clone();
                async move {
                    client
                        .send(probe)
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            },
            &BackoffConfig::default(),
        )
        .await?;
    }

    let (trigger, mut commands) = ChannelTrigger::new();
    let toasts = ToastQueue::new();
    let guard = AutoRetry::start(
        config.clone(),
        HostBindings::new(Arc::new(trigger)).with_sink(Arc::new(toasts.clone())),
    )?;
    let transport = Observed::new(guard.wrap(http), config.target, Arc::new(LoggingObserver));

    loop {
        let result = transport.send(request.clone()).await;
        print_toasts(&toasts);

        if let Ok(resp) = &result
            && resp.is_success()
        {
            guard.shutdown();
            return Ok(resp.body.clone());
        }
        if guard.coordinator().phase() == RetryPhase::Stopped {
            let count = guard.coordinator().failure_count();
            guard.shutdown();
            return Err(format!("giving up after {count} consecutive failures"));
        }

        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => info!("Regenerating (attempt {})", cmd.sequence + 1),
                None => return Err("regenerate channel closed".to_string()),
            },
            _ = tokio::signal::ctrl_c() => {
                guard.shutdown();
                return Err("interrupted".to_string());
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli).await {
        Ok(body) => println!("{body}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("autoregen").chain(args.iter().copied()))
    }

    #[test]
    fn unwatched_url_is_rejected_up_front() {
        let c = cli(&["--url", "http://127.0.0.1:18777/other", "--prompt", "hi"]);
        let config = c.settings().unwrap().into_config().unwrap();
        let err = ensure_watched(&config, &c.url).unwrap_err();
        assert!(err.contains("not watched"), "{err}");
        assert!(err.contains("/api/generate"), "{err}");
    }

    #[test]
    fn target_flag_makes_url_watched() {
        let c = cli(&[
            "--url",
            "http://127.0.0.1:18777/other",
            "--prompt",
            "hi",
            "--target",
            "/other",
        ]);
        let config = c.settings().unwrap().into_config().unwrap();
        assert!(ensure_watched(&config, &c.url).is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let c = cli(&[
            "--url",
            "http://h/api/generate",
            "--prompt",
            "hi",
            "--max-fails",
            "2",
        ]);
        let config = c.settings().unwrap().into_config().unwrap();
        assert_eq!(config.max_failures, 2);
        let req = c.request().unwrap();
        assert_eq!(req.body.unwrap()["prompt"], "hi");
    }

    #[tokio::test]
    async fn run_fails_fast_on_unwatched_url() {
        let c = cli(&["--url", "http://127.0.0.1:9/other", "--prompt", "hi"]);
        let err = run(&c).await.unwrap_err();
        assert!(err.contains("not watched"), "{err}");
    }
}
