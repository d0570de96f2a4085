//! Integration tests for the `pulsetrack` CLI binary.
//!
//! These tests exercise the CLI as a subprocess, verifying exit codes and
//! stdout output. `send` is pointed either at a closed port or at a one-shot
//! collector stub running on a background thread.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use std::thread;

/// Helper: locate the `pulsetrack` binary built by `cargo test`.
fn pulsetrack_bin() -> String {
    let path = env!("CARGO_BIN_EXE_pulsetrack");
    assert!(
        Path::new(path).exists(),
        "pulsetrack binary not found at {path}"
    );
    path.to_owned()
}

/// Helper: run pulsetrack with args and return (`exit_code`, stdout, stderr).
fn run(args: &[&str]) -> (i32, String, String) {
    let output = Command::new(pulsetrack_bin())
        .args(args)
        .env("PULSETRACK_ENDPOINT", "http://127.0.0.1:19999/api/track") // Nothing listens here
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute pulsetrack");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

/// Helper: accept one HTTP request, answer with `status_line` and `body`,
/// and hand back the request body.
fn one_shot_collector(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/track", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }

        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();

        String::from_utf8(request_body).unwrap()
    });

    (url, handle)
}

// ── Version & help ───────────────────────────────────────────────────

#[test]
fn test_version_flag() {
    let (code, stdout, _) = run(&["--version"]);
    assert_eq!(code, 0, "pulsetrack --version should exit 0");
    assert!(
        stdout.contains("pulsetrack"),
        "version output should contain 'pulsetrack': {stdout}"
    );
}

#[test]
fn test_help_lists_subcommands() {
    let (code, stdout, _) = run(&["--help"]);
    assert_eq!(code, 0, "pulsetrack --help should exit 0");
    for sub in ["classify", "inspect", "send"] {
        assert!(stdout.contains(sub), "help should list '{sub}': {stdout}");
    }
}

// ── classify ─────────────────────────────────────────────────────────

#[test]
fn test_classify_ipad_is_tablet() {
    let (code, stdout, _) = run(&[
        "classify",
        "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15",
    ]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "tablet");
}

#[test]
fn test_classify_iphone_is_mobile() {
    let (code, stdout, _) = run(&[
        "classify",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148",
    ]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "mobile");
}

#[test]
fn test_classify_plain_desktop() {
    let (code, stdout, _) = run(&[
        "classify",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0",
    ]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "desktop");
}

// ── inspect ──────────────────────────────────────────────────────────

#[test]
fn test_inspect_reports_utm_fields_and_nulls() {
    let (code, stdout, _) = run(&[
        "inspect",
        "https://example.com/guide?id=abc&utm_source=google&utm_medium=cpc",
    ]);
    assert_eq!(code, 0);

    let identity: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(identity["id"], "abc");
    assert_eq!(identity["utm_source"], "google");
    assert_eq!(identity["utm_medium"], "cpc");
    assert!(identity["utm_campaign"].is_null());
    assert!(identity["utm_content"].is_null());
}

// ── send ─────────────────────────────────────────────────────────────

#[test]
fn test_send_rejects_unknown_event_type() {
    let (code, _, stderr) = run(&["send", "click", "--page-url", "https://example.com/"]);
    assert_ne!(code, 0);
    assert!(
        stderr.contains("unknown event type"),
        "stderr should explain the failure: {stderr}"
    );
}

#[test]
fn test_send_dry_run_prints_payload() {
    let (code, stdout, _) = run(&[
        "send",
        "heartbeat",
        "--page-url",
        "https://example.com/guide?id=abc",
        "--time-on-page",
        "60",
        "--scroll",
        "40",
        "--slug",
        "budget-guide",
        "--dry-run",
    ]);
    assert_eq!(code, 0);

    let payload: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(payload["event_type"], "heartbeat");
    assert_eq!(payload["id"], "abc");
    assert_eq!(payload["time_on_page_seconds"], 60);
    assert_eq!(payload["max_scroll_percent"], 40);
    assert_eq!(payload["device_type"], "desktop");
    assert_eq!(payload["lead_magnet_slug"], "budget-guide");
}

#[test]
fn test_send_rejects_scroll_out_of_range() {
    let (code, _, _) = run(&[
        "send",
        "heartbeat",
        "--page-url",
        "https://example.com/",
        "--scroll",
        "150",
        "--dry-run",
    ]);
    assert_ne!(code, 0);
}

#[test]
fn test_send_fails_without_collector() {
    let (code, _, stderr) = run(&["send", "page_open", "--page-url", "https://example.com/"]);
    assert_ne!(code, 0, "send should fail when the collector is unreachable");
    assert!(stderr.contains("Error"), "stderr should report an error: {stderr}");
}

#[test]
fn test_send_posts_payload_and_prints_ack() {
    let (url, collector) = one_shot_collector(
        "HTTP/1.1 200 OK",
        r#"{"success":true,"message":"Event tracked"}"#,
    );

    let (code, stdout, stderr) = run(&[
        "send",
        "page_exit",
        "--page-url",
        "https://example.com/guide?id=xyz",
        "--endpoint",
        &url,
    ]);
    assert_eq!(code, 0, "send should succeed: {stderr}");
    assert!(stdout.contains("Event tracked"), "stdout: {stdout}");

    let received: serde_json::Value = serde_json::from_str(&collector.join().unwrap()).unwrap();
    assert_eq!(received["event_type"], "page_exit");
    assert_eq!(received["id"], "xyz");
    assert!(received.get("lead_magnet_slug").is_none());
}

#[test]
fn test_send_fails_on_collector_rejection() {
    let (url, collector) = one_shot_collector(
        "HTTP/1.1 400 Bad Request",
        r#"{"success":false,"message":"Invalid JSON"}"#,
    );

    let (code, _, stderr) = run(&[
        "send",
        "heartbeat",
        "--page-url",
        "https://example.com/",
        "--endpoint",
        &url,
    ]);
    collector.join().unwrap();

    assert_ne!(code, 0);
    assert!(stderr.contains("400"), "stderr should carry the status: {stderr}");
}
