//! Server configuration for the `pulsetrack` collector.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `PULSETRACK_*` environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Default listener port when neither `PULSETRACK_BIND_ADDR` nor `PORT` is set.
const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Automation webhook that receives every accepted event. `None` means
    /// events are validated and logged but not relayed.
    pub webhook_url: Option<String>,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Upper bound on a single forward to the webhook, in seconds.
    pub forward_timeout_secs: u64,
    /// Largest request body accepted on `/api/track`.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (platform convention, binds to `0.0.0.0`)
    /// - `PULSETRACK_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `PULSETRACK_WEBHOOK_URL`: automation webhook to relay events to (optional)
    /// - `PULSETRACK_LOG_LEVEL`: log filter (default: `info`)
    /// - `PULSETRACK_FORWARD_TIMEOUT_SECS`: webhook request timeout (default: `10`)
    /// - `PULSETRACK_MAX_BODY_BYTES`: request body limit (default: `65536`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Priority: PULSETRACK_BIND_ADDR > PORT > default 127.0.0.1:3000
        let bind_addr = if let Some(addr) = lookup("PULSETRACK_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port_str) = lookup("PORT") {
            let port: u16 = port_str.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let webhook_url = lookup("PULSETRACK_WEBHOOK_URL")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());

        let log_level = lookup("PULSETRACK_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let forward_timeout_secs = lookup("PULSETRACK_FORWARD_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(10);

        let max_body_bytes = lookup("PULSETRACK_MAX_BODY_BYTES")
            .and_then(|v| v.parse().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(64 * 1024);

        Self {
            bind_addr,
            webhook_url,
            log_level,
            forward_timeout_secs,
            max_body_bytes,
        }
    }

    #[must_use]
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }
}
