//! Event collection route: `/api/track`
//!
//! `POST` accepts one tracking event, checks it parses as JSON, and relays
//! the original text to the configured webhook. `OPTIONS` answers preflight
//! probes with an empty JSON object.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use pulsetrack_core::EventKind;

use crate::error::{AppError, TrackAck};
use crate::state::AppState;

/// How much of a rejected body is echoed into the log.
const LOG_PREVIEW_CHARS: usize = 200;

/// Build the `/api/track` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/track", post(track_event).options(preflight))
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn track_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TrackAck>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    debug!(content_type, bytes = body.len(), "tracking request received");

    if body.is_empty() {
        warn!("rejected tracking request with empty body");
        return Err(AppError::BadRequest("Empty body".to_owned()));
    }

    let Ok(text) = String::from_utf8(body.to_vec()) else {
        warn!(bytes = body.len(), "rejected tracking request that is not UTF-8");
        return Err(AppError::BadRequest("Invalid JSON".to_owned()));
    };

    let event: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, body = %preview(&text), "rejected tracking request with invalid JSON");
            return Err(AppError::BadRequest("Invalid JSON".to_owned()));
        }
    };

    let event_type = event.get("event_type").and_then(Value::as_str).unwrap_or("");
    let known = event_type.parse::<EventKind>().is_ok();
    info!(event_type, known, "tracking event accepted");

    match state.sink.forward(text).await {
        Ok(receipt) if receipt.is_success() => {
            debug!(status = ?receipt.status, "webhook accepted event");
        }
        Ok(receipt) => {
            warn!(
                status = ?receipt.status,
                response = %preview(&receipt.body),
                "webhook returned an error status"
            );
        }
        Err(e) => {
            error!(error = %e, event_type, "failed to forward tracking event");
            return Ok(Json(TrackAck::rejected("Tracking error logged")));
        }
    }

    Ok(Json(TrackAck::accepted("Event tracked")))
}

async fn preflight() -> Json<Value> {
    Json(Value::Object(serde_json::Map::new()))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
