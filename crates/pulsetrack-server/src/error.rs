//! HTTP error types for the `pulsetrack` collector.
//!
//! Rejections produce the same JSON acknowledgement shape as successes:
//! `{"success": false, "message": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Client sent a body that cannot be accepted.
    BadRequest(String),
}

/// Acknowledgement body returned by `/api/track`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackAck {
    pub success: bool,
    pub message: String,
}

impl TrackAck {
    #[must_use]
    pub fn accepted(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn rejected(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, axum::Json(TrackAck::rejected(&message))).into_response()
    }
}

/// Failure to relay an event to the automation webhook.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("webhook request to {url} timed out")]
    Timeout { url: String },

    #[error("webhook request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("failed to build webhook client: {0}")]
    Client(String),
}
