//! Per-page-view session state.
//!
//! A [`VisitSession`] is created by `VisitTracker::initialize` and dropped by
//! `VisitTracker::teardown`. Identity, device class, and start time are fixed
//! at construction; the only mutable state is scroll depth, lifecycle, the
//! exit latch, and the timer handles.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::device::DeviceClass;
use crate::host::TimerHandle;
use crate::identity::VisitIdentity;
use crate::payload::elapsed_seconds;

/// Whether the page is currently in front of the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Hidden,
}

/// Independent browser signals that each mean "the visitor is leaving".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitTrigger {
    BeforeUnload,
    PageHide,
    Teardown,
    /// A `page_exit` requested through `VisitTracker::record_event`.
    Diagnostic,
}

/// Single-writer latch collapsing every [`ExitTrigger`] into one exit event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitLatch {
    fired_by: Option<ExitTrigger>,
}

impl ExitLatch {
    /// Try to fire. Returns `true` only for the first trigger.
    pub fn fire(&mut self, trigger: ExitTrigger) -> bool {
        if self.fired_by.is_some() {
            return false;
        }
        self.fired_by = Some(trigger);
        true
    }

    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired_by.is_some()
    }

    #[must_use]
    pub fn fired_by(&self) -> Option<ExitTrigger> {
        self.fired_by
    }
}

/// State of one page view.
#[derive(Debug)]
pub struct VisitSession {
    started_at: DateTime<Utc>,
    identity: VisitIdentity,
    device: DeviceClass,
    max_scroll_percent: u8,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) exit: ExitLatch,
    pub(crate) heartbeat: Option<TimerHandle>,
    pub(crate) scroll_timer: Option<TimerHandle>,
}

impl VisitSession {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, identity: VisitIdentity, device: DeviceClass) -> Self {
        Self {
            started_at,
            identity,
            device,
            max_scroll_percent: 0,
            lifecycle: Lifecycle::Active,
            exit: ExitLatch::default(),
            heartbeat: None,
            scroll_timer: None,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn identity(&self) -> &VisitIdentity {
        &self.identity
    }

    #[must_use]
    pub fn device(&self) -> DeviceClass {
        self.device
    }

    #[must_use]
    pub fn max_scroll_percent(&self) -> u8 {
        self.max_scroll_percent
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn exit_fired(&self) -> bool {
        self.exit.is_fired()
    }

    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// Raise the scroll high-water mark. Returns `true` if it moved.
    pub fn observe_scroll(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        if percent > self.max_scroll_percent {
            self.max_scroll_percent = percent;
            true
        } else {
            false
        }
    }

    /// Whole seconds on the page as of `now`.
    #[must_use]
    pub fn time_on_page(&self, now: DateTime<Utc>) -> u64 {
        elapsed_seconds(self.started_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> VisitSession {
        VisitSession::new(Utc::now(), VisitIdentity::default(), DeviceClass::Desktop)
    }

    #[test]
    fn scroll_high_water_mark_never_decreases() {
        let mut s = session();
        let observed = [10u8, 55, 30, 55, 70, 0, 69];
        for pct in observed {
            s.observe_scroll(pct);
        }
        assert_eq!(s.max_scroll_percent(), 70);
    }

    #[test]
    fn scroll_is_clamped() {
        let mut s = session();
        assert!(s.observe_scroll(250));
        assert_eq!(s.max_scroll_percent(), 100);
    }

    #[test]
    fn latch_fires_once_and_remembers_winner() {
        let mut latch = ExitLatch::default();
        assert!(!latch.is_fired());
        assert!(latch.fire(ExitTrigger::PageHide));
        assert!(!latch.fire(ExitTrigger::BeforeUnload));
        assert!(!latch.fire(ExitTrigger::Teardown));
        assert_eq!(latch.fired_by(), Some(ExitTrigger::PageHide));
    }

    #[test]
    fn new_session_starts_active_and_unlatched() {
        let s = session();
        assert_eq!(s.lifecycle(), Lifecycle::Active);
        assert!(!s.exit_fired());
        assert!(!s.heartbeat_running());
        assert_eq!(s.max_scroll_percent(), 0);
    }
}
