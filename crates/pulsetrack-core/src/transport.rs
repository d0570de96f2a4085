//! Event delivery: transports and the primary/fallback strategy.
//!
//! Delivery is fire-and-forget. Exit-like events try the beacon path first
//! (a one-shot send that survives page teardown) and fall back once to a
//! keep-alive request; every other event goes straight to the keep-alive
//! request. Nothing is retried beyond that single fallback and nothing is
//! queued.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::TransportError;
use crate::payload::TrackingPayload;

/// Result of handing a body to the beacon path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconStatus {
    /// The host accepted the body for background delivery.
    Queued,
    /// The host refused the body (queue full, size limit).
    Rejected,
    /// The host has no beacon mechanism.
    Unavailable,
}

/// Uniform result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// Handed off on the preferred path.
    Delivered,
    /// Primary path failed; the fallback request was dispatched.
    Degraded,
    /// Every path failed; the event is gone.
    Dropped,
}

/// Outbound channel to the collector.
///
/// Both methods return as soon as the request is handed off; completion is
/// never awaited by the tracker.
pub trait Transport: Send + Sync {
    /// Best-effort one-shot delivery that survives page teardown.
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> BeaconStatus;

    /// A standard `POST` carrying a keep-alive hint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request could not be dispatched.
    fn send_keepalive(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError>;
}

/// Primary/fallback delivery strategy bound to one collector endpoint.
#[derive(Clone)]
pub struct Dispatcher {
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Same transport, different endpoint.
    #[must_use]
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, Arc::clone(&self.transport))
    }

    /// Deliver one payload. Never fails; the outcome says how it went.
    pub fn deliver(&self, payload: &TrackingPayload) -> DeliveryOutcome {
        let kind = payload.event_type;
        let body = match payload.to_body() {
            Ok(body) => body,
            Err(e) => {
                warn!(event_type = %kind, error = %e, "failed to serialize tracking payload");
                return DeliveryOutcome::Dropped;
            }
        };

        if !kind.is_exit_like() {
            return match self.transport.send_keepalive(&self.endpoint, body) {
                Ok(()) => DeliveryOutcome::Delivered,
                Err(e) => {
                    warn!(event_type = %kind, error = %e, "tracking request failed");
                    DeliveryOutcome::Dropped
                }
            };
        }

        match self.transport.send_beacon(&self.endpoint, body.clone()) {
            BeaconStatus::Queued => {
                debug!(event_type = %kind, "event queued via beacon");
                DeliveryOutcome::Delivered
            }
            status => {
                warn!(event_type = %kind, ?status, "beacon not accepted, falling back to keep-alive request");
                match self.transport.send_keepalive(&self.endpoint, body) {
                    Ok(()) => DeliveryOutcome::Degraded,
                    Err(e) => {
                        warn!(event_type = %kind, error = %e, "keep-alive fallback failed, event dropped");
                        DeliveryOutcome::Dropped
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Resolve a collector endpoint against the page URL.
///
/// Absolute endpoints are returned unchanged. A relative one is joined onto
/// `page_url`, so `/api/track` on `https://example.com/guide?id=1` becomes
/// `https://example.com/api/track`. If the page URL cannot serve as a base
/// the endpoint is returned as given.
#[must_use]
pub fn resolve_endpoint(endpoint: &str, page_url: &str) -> String {
    if Url::parse(endpoint).is_ok() {
        return endpoint.to_owned();
    }
    match Url::parse(page_url).and_then(|base| base.join(endpoint)) {
        Ok(url) => url.into(),
        Err(e) => {
            warn!(endpoint, page_url, error = %e, "cannot resolve collector endpoint against page URL");
            endpoint.to_owned()
        }
    }
}

/// HTTP transport for native hosts, backed by `reqwest`.
///
/// Both paths detach the `POST` onto the ambient tokio runtime. Outside a
/// runtime the beacon path reports [`BeaconStatus::Unavailable`] and the
/// keep-alive path fails, so the strategy above drops the event.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn spawn_post(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            TransportError::Unavailable {
                reason: e.to_string(),
            }
        })?;

        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(|e| TransportError::Dispatch {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let client = self.client.clone();
        handle.spawn(async move {
            let url = request.url().clone();
            match client.execute(request).await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(%url, status = resp.status().as_u16(), "tracking request completed");
                }
                Ok(resp) => {
                    warn!(%url, status = resp.status().as_u16(), "collector rejected tracking request");
                }
                Err(e) => {
                    warn!(%url, error = %e, "tracking request failed");
                }
            }
        });

        Ok(())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl Transport for HttpTransport {
    fn send_beacon(&self, url: &str, body: Vec<u8>) -> BeaconStatus {
        match self.spawn_post(url, body) {
            Ok(()) => BeaconStatus::Queued,
            Err(TransportError::Unavailable { .. }) => BeaconStatus::Unavailable,
            Err(_) => BeaconStatus::Rejected,
        }
    }

    fn send_keepalive(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        self.spawn_post(url, body)
    }
}
