//! HTTP route modules for the `pulsetrack` collector.

pub mod health;
pub mod track;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;

use crate::state::AppState;

/// Assemble every route with the request body limit applied.
///
/// Cross-cutting layers (tracing, CORS, response headers) are added by the
/// binary on top of this.
pub fn app(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(track::router())
        .merge(health::router())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
