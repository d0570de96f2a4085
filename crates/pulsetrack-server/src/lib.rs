//! `pulsetrack` collector server.
//!
//! Accepts tracking events posted by the page tracker at `/api/track`,
//! checks that each body is well-formed JSON, and relays the raw text to an
//! external automation webhook. Forwarding failures are logged and reported
//! in the acknowledgement body, never as an HTTP error, so the tracker is
//! never disturbed by downstream trouble.

pub mod config;
pub mod error;
pub mod forward;
pub mod routes;
pub mod state;
