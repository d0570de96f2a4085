//! Relaying accepted events to the automation webhook.
//!
//! The collector talks to its downstream through the [`WebhookSink`] trait.
//! [`HttpWebhook`] posts to a real endpoint with `reqwest`; [`LogOnlySink`]
//! is used when no webhook is configured and just records the event.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use tracing::info;

use crate::error::ForwardError;

/// What the downstream said about a forwarded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardReceipt {
    /// HTTP status returned by the webhook. `None` when nothing was sent.
    pub status: Option<u16>,
    /// Response body, kept for logging only.
    pub body: String,
}

impl ForwardReceipt {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_none_or(|code| (200..300).contains(&code))
    }
}

/// Downstream that receives accepted tracking events.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Relay the raw event text exactly as it was received.
    async fn forward(&self, body: String) -> Result<ForwardReceipt, ForwardError>;

    /// Whether events actually leave this process.
    fn is_forwarding(&self) -> bool;
}

/// Posts events to an HTTP webhook.
#[derive(Debug, Clone)]
pub struct HttpWebhook {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhook {
    /// Create a webhook client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Client` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookSink for HttpWebhook {
    async fn forward(&self, body: String) -> Result<ForwardReceipt, ForwardError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.request_error(&e))?;

        let status = response.status().as_u16();
        // The body is informational; an unreadable one is not a failed forward.
        let body = response.text().await.unwrap_or_default();

        Ok(ForwardReceipt {
            status: Some(status),
            body,
        })
    }

    fn is_forwarding(&self) -> bool {
        true
    }
}

impl HttpWebhook {
    fn request_error(&self, err: &reqwest::Error) -> ForwardError {
        if err.is_timeout() {
            ForwardError::Timeout {
                url: self.url.clone(),
            }
        } else {
            ForwardError::Request {
                url: self.url.clone(),
                reason: err.to_string(),
            }
        }
    }
}

/// Accepts events without relaying them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlySink;

#[async_trait]
impl WebhookSink for LogOnlySink {
    async fn forward(&self, body: String) -> Result<ForwardReceipt, ForwardError> {
        info!(bytes = body.len(), "no webhook configured, event not relayed");
        Ok(ForwardReceipt {
            status: None,
            body: String::new(),
        })
    }

    fn is_forwarding(&self) -> bool {
        false
    }
}
