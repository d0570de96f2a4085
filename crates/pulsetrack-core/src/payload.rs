//! Event kinds and the JSON payload posted to the collector.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceClass;
use crate::identity::VisitIdentity;

/// Kind of telemetry event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageOpen,
    PageExit,
    Heartbeat,
    TabHidden,
    TabVisible,
}

impl EventKind {
    pub const ALL: [Self; 5] = [
        Self::PageOpen,
        Self::PageExit,
        Self::Heartbeat,
        Self::TabHidden,
        Self::TabVisible,
    ];

    /// Events that may be the last thing the page ever sends. These go
    /// through the beacon path first.
    #[must_use]
    pub fn is_exit_like(self) -> bool {
        matches!(self, Self::PageExit | Self::TabHidden)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PageOpen => "page_open",
            Self::PageExit => "page_exit",
            Self::Heartbeat => "heartbeat",
            Self::TabHidden => "tab_hidden",
            Self::TabVisible => "tab_visible",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_owned()))
    }
}

/// Body of every event sent to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPayload {
    pub id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub time_on_page_seconds: u64,
    pub max_scroll_percent: u8,
    pub device_type: DeviceClass,
    pub event_type: EventKind,
    /// ISO-8601 UTC, millisecond precision, `Z` suffix.
    pub timestamp: String,
    pub page_url: String,
    #[serde(
        rename = "lead_magnet_slug",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_slug: Option<String>,
}

impl TrackingPayload {
    /// Assemble a payload. `page_open` always reports zero time and zero scroll.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: EventKind,
        identity: &VisitIdentity,
        device: DeviceClass,
        time_on_page_seconds: u64,
        max_scroll_percent: u8,
        at: DateTime<Utc>,
        page_url: String,
        source_slug: Option<String>,
    ) -> Self {
        let (time_on_page_seconds, max_scroll_percent) = if kind == EventKind::PageOpen {
            (0, 0)
        } else {
            (time_on_page_seconds, max_scroll_percent.min(100))
        };

        Self {
            id: identity.id.clone(),
            utm_source: identity.utm_source.clone(),
            utm_medium: identity.utm_medium.clone(),
            utm_campaign: identity.utm_campaign.clone(),
            utm_content: identity.utm_content.clone(),
            time_on_page_seconds,
            max_scroll_percent,
            device_type: device,
            event_type: kind,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            page_url,
            source_slug,
        }
    }

    /// Serialize to the JSON wire body.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Whole seconds elapsed between `start` and `now`, rounded to nearest.
///
/// A clock that went backwards reports zero.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn elapsed_seconds(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (now - start).num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}
