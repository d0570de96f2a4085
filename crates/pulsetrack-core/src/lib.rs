//! Core library for `pulsetrack`.
//!
//! Contains the per-page-view session model, device classification, UTM
//! identity parsing, the collector payload, the beacon/keep-alive delivery
//! strategy, and the [`VisitTracker`](tracker::VisitTracker) state machine.
//! The browsing context is reached only through the traits in [`host`], so
//! this crate knows nothing about any particular browser binding.

pub mod device;
pub mod error;
pub mod host;
pub mod identity;
pub mod payload;
pub mod runtime;
pub mod session;
pub mod tracker;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use device::DeviceClass;
pub use identity::VisitIdentity;
pub use payload::{EventKind, TrackingPayload};
pub use tracker::{Signal, TrackerConfig, VisitTracker};
pub use transport::{DeliveryOutcome, Dispatcher, HttpTransport, Transport};
