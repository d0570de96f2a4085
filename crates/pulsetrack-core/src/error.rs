//! Error types for `pulsetrack-core`.
//!
//! None of these ever reach the page: the tracker converts every failure
//! into a logged warning and a [`crate::transport::DeliveryOutcome`].

/// Errors from dispatching a request through a [`crate::transport::Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No async runtime or network stack is available to carry the request.
    #[error("transport unavailable: {reason}")]
    Unavailable { reason: String },

    /// The request could not be built or handed off.
    #[error("dispatch to '{url}' failed: {reason}")]
    Dispatch { url: String, reason: String },

    /// The payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
