//! Host environment traits.
//!
//! The tracker never talks to a browser directly. Everything it reads (URL,
//! user agent, visibility, scroll geometry, wall clock) and everything it
//! schedules (heartbeat interval, scroll throttle) goes through these traits,
//! so a `web-sys` binding, the tokio driver in [`crate::runtime`], or a test
//! double can host it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Document visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Raw scroll geometry of the document, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Scroll depth as a whole percentage in `[0, 100]`.
    ///
    /// A document that fits inside the viewport counts as fully scrolled.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        let scrollable = self.scroll_height - self.client_height;
        if scrollable <= 0.0 {
            return 100;
        }
        let pct = (self.scroll_top / scrollable * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Read access to the page the tracker is observing.
pub trait PageContext: Send {
    /// Full URL of the page, including the query string.
    fn href(&self) -> String;

    /// The browser's user-agent string.
    fn user_agent(&self) -> String;

    /// Current document visibility.
    fn visibility(&self) -> Visibility;

    /// Current scroll geometry.
    fn scroll_metrics(&self) -> ScrollMetrics;
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Opaque identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// What a timer is for. Delivered back as [`crate::tracker::Signal::TimerFired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    Heartbeat,
    ScrollThrottle,
}

/// Timer scheduling provided by the host.
///
/// Timers never call into the tracker directly: when one fires the host
/// hands `Signal::TimerFired(purpose, handle)` to [`crate::tracker::VisitTracker::handle`].
pub trait Timers: Send {
    /// Schedule a recurring timer. The first tick happens one `period` from now.
    fn set_interval(&mut self, period: Duration, purpose: TimerPurpose) -> TimerHandle;

    /// Schedule a one-shot timer.
    fn set_timeout(&mut self, delay: Duration, purpose: TimerPurpose) -> TimerHandle;

    /// Cancel a timer. Clearing an unknown or already-fired handle is a no-op.
    fn clear(&mut self, handle: TimerHandle);
}
