//! Shared application state for the `pulsetrack` collector.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::ForwardError;
use crate::forward::{HttpWebhook, LogOnlySink, WebhookSink};

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Where accepted events are relayed.
    pub sink: Arc<dyn WebhookSink>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("forwarding", &self.sink.is_forwarding())
            .finish_non_exhaustive()
    }
}

impl AppState {
    #[must_use]
    pub fn new(sink: Arc<dyn WebhookSink>) -> Self {
        Self { sink }
    }

    /// Pick the sink described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ForwardError::Client` if the webhook client cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ForwardError> {
        let sink: Arc<dyn WebhookSink> = match &config.webhook_url {
            Some(url) => Arc::new(HttpWebhook::new(url.clone(), config.forward_timeout())?),
            None => Arc::new(LogOnlySink),
        };
        Ok(Self::new(sink))
    }
}
