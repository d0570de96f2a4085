//! `pulsetrack` CLI: diagnostics for the visit tracker and its collector.
//!
//! `classify` and `inspect` run the tracker's own device and identity logic
//! against arbitrary input. `send` builds one event exactly as a page would
//! and posts it to a collector.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use pulsetrack_core::{DeviceClass, EventKind, TrackingPayload, VisitIdentity};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

/// User agent reported by `send` when none is given.
const DEFAULT_USER_AGENT: &str = concat!("pulsetrack-cli/", env!("CARGO_PKG_VERSION"));

// ── CLI structure ────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pulsetrack",
    version,
    about = "pulsetrack CLI: inspect visits and send test events to a collector",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         PULSETRACK_ENDPOINT   Collector URL for `send` (default: http://127.0.0.1:3000/api/track)\n\n\
         {DIM}Examples:{RESET}\n  \
         pulsetrack classify 'Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)'\n  \
         pulsetrack inspect 'https://example.com/guide?id=abc&utm_source=google'\n  \
         pulsetrack send heartbeat --page-url 'https://example.com/guide?id=abc' --time-on-page 60"
    ),
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a user-agent string as mobile, tablet, or desktop.
    Classify {
        /// Raw user-agent string.
        user_agent: String,
    },
    /// Print the visit identity (id and UTM fields) parsed from a page URL.
    Inspect {
        /// Full page URL including the query string.
        page_url: String,
    },
    /// Build a tracking event and post it to a collector.
    Send {
        /// Event type: page_open, page_exit, heartbeat, tab_hidden, tab_visible.
        event_type: String,
        /// URL of the page the event claims to come from.
        #[arg(long)]
        page_url: String,
        /// User agent used for device classification.
        #[arg(long, default_value = DEFAULT_USER_AGENT)]
        user_agent: String,
        /// Source slug (sent as `lead_magnet_slug`).
        #[arg(long)]
        slug: Option<String>,
        /// Deepest scroll percentage reached (0-100).
        #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=100))]
        scroll: u8,
        /// Seconds spent on the page.
        #[arg(long, default_value = "0")]
        time_on_page: u64,
        /// Collector endpoint.
        #[arg(long, env = "PULSETRACK_ENDPOINT", default_value = "http://127.0.0.1:3000/api/track")]
        endpoint: String,
        /// Request timeout in seconds.
        #[arg(long, default_value = "10")]
        timeout: u64,
        /// Print the payload without sending it.
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
}

// ── Output helpers ───────────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn print_ack(status: reqwest::StatusCode, ack: &Value) {
    let accepted = ack.get("success").and_then(Value::as_bool).unwrap_or(false);
    let message = ack.get("message").and_then(Value::as_str).unwrap_or("-");

    header("📡", "Collector Response");
    kv_line("HTTP status", status.as_str());
    kv_line("Message", message);
    println!();

    if accepted {
        success("Event tracked");
    } else {
        warning("Collector accepted the request but could not forward it");
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────

async fn handle_response(resp: reqwest::Response) -> Result<(reqwest::StatusCode, Value)> {
    let status = resp.status();
    let body = resp.text().await.context("failed to read response body")?;
    if !status.is_success() {
        bail!("collector returned {status}: {body}");
    }
    if body.is_empty() {
        return Ok((status, Value::Null));
    }
    let value = serde_json::from_str(&body).context("failed to parse response JSON")?;
    Ok((status, value))
}

// ── Commands ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Classify { user_agent } => {
            cmd_classify(&user_agent);
            Ok(())
        }
        Commands::Inspect { page_url } => cmd_inspect(&page_url),
        Commands::Send {
            event_type,
            page_url,
            user_agent,
            slug,
            scroll,
            time_on_page,
            endpoint,
            timeout,
            dry_run,
        } => {
            let kind: EventKind = event_type.parse()?;
            let payload = build_payload(kind, page_url, &user_agent, slug, scroll, time_on_page);
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }
            cmd_send(&endpoint, Duration::from_secs(timeout), &payload).await
        }
    }
}

fn cmd_classify(user_agent: &str) {
    println!("{}", DeviceClass::from_user_agent(user_agent));
}

fn cmd_inspect(page_url: &str) -> Result<()> {
    let identity = VisitIdentity::from_page_url(page_url);
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

fn build_payload(
    kind: EventKind,
    page_url: String,
    user_agent: &str,
    slug: Option<String>,
    scroll: u8,
    time_on_page: u64,
) -> TrackingPayload {
    let identity = VisitIdentity::from_page_url(&page_url);
    let device = DeviceClass::from_user_agent(user_agent);
    TrackingPayload::new(
        kind,
        &identity,
        device,
        time_on_page,
        scroll,
        Utc::now(),
        page_url,
        slug.filter(|s| !s.is_empty()),
    )
}

async fn cmd_send(endpoint: &str, timeout: Duration, payload: &TrackingPayload) -> Result<()> {
    let body = payload.to_body().context("failed to encode payload")?;
    debug!(endpoint, event_type = %payload.event_type, bytes = body.len(), "sending event");

    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")?;

    let resp = http
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .with_context(|| format!("failed to reach collector at {endpoint}"))?;

    let (status, ack) = handle_response(resp).await?;
    print_ack(status, &ack);
    Ok(())
}
