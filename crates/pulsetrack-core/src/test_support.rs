//! Test doubles for the host traits.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::TransportError;
use crate::host::{Clock, PageContext, ScrollMetrics, TimerHandle, TimerPurpose, Timers, Visibility};
use crate::payload::{EventKind, TrackingPayload};
use crate::transport::{BeaconStatus, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    Beacon,
    Keepalive,
}

/// Records every body it is handed.
pub struct RecordingTransport {
    sent: Mutex<Vec<(Path, TrackingPayload)>>,
    beacon: Mutex<BeaconStatus>,
    fail_keepalive: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::with_beacon(BeaconStatus::Queued)
    }
}

impl RecordingTransport {
    pub fn with_beacon(status: BeaconStatus) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            beacon: Mutex::new(status),
            fail_keepalive: AtomicBool::new(false),
        }
    }

    pub fn fail_keepalive(&self, fail: bool) {
        self.fail_keepalive.store(fail, Ordering::SeqCst);
    }

    pub fn payloads(&self) -> Vec<TrackingPayload> {
        self.sent.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.payloads().iter().map(|p| p.event_type).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn beacon_count(&self) -> usize {
        self.path_count(Path::Beacon)
    }

    pub fn keepalive_count(&self) -> usize {
        self.path_count(Path::Keepalive)
    }

    fn path_count(&self, path: Path) -> usize {
        self.sent.lock().unwrap().iter().filter(|(p, _)| *p == path).count()
    }

    fn record(&self, path: Path, body: &[u8]) {
        let payload: TrackingPayload = serde_json::from_slice(body).unwrap();
        self.sent.lock().unwrap().push((path, payload));
    }
}

impl Transport for RecordingTransport {
    fn send_beacon(&self, _url: &str, body: Vec<u8>) -> BeaconStatus {
        let status = *self.beacon.lock().unwrap();
        if status == BeaconStatus::Queued {
            self.record(Path::Beacon, &body);
        }
        status
    }

    fn send_keepalive(&self, url: &str, body: Vec<u8>) -> Result<(), TransportError> {
        if self.fail_keepalive.load(Ordering::SeqCst) {
            return Err(TransportError::Dispatch {
                url: url.to_owned(),
                reason: "simulated failure".to_owned(),
            });
        }
        self.record(Path::Keepalive, &body);
        Ok(())
    }
}

/// Mutable page state shared between a test and the tracker.
#[derive(Clone)]
pub struct FakePage {
    inner: Arc<Mutex<PageState>>,
}

struct PageState {
    href: String,
    user_agent: String,
    visibility: Visibility,
    scroll: ScrollMetrics,
}

impl FakePage {
    pub fn new(href: &str, user_agent: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PageState {
                href: href.to_owned(),
                user_agent: user_agent.to_owned(),
                visibility: Visibility::Visible,
                scroll: ScrollMetrics {
                    scroll_top: 0.0,
                    scroll_height: 2000.0,
                    client_height: 1000.0,
                },
            })),
        }
    }

    /// Scroll so that the document reports `percent`.
    pub fn scroll_to(&self, percent: u8) {
        let mut state = self.inner.lock().unwrap();
        let scrollable = state.scroll.scroll_height - state.scroll.client_height;
        state.scroll.scroll_top = scrollable * f64::from(percent) / 100.0;
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.inner.lock().unwrap().visibility = visibility;
    }
}

impl PageContext for FakePage {
    fn href(&self) -> String {
        self.inner.lock().unwrap().href.clone()
    }

    fn user_agent(&self) -> String {
        self.inner.lock().unwrap().user_agent.clone()
    }

    fn visibility(&self) -> Visibility {
        self.inner.lock().unwrap().visibility
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        self.inner.lock().unwrap().scroll
    }
}

/// Clock advanced by hand.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Timers that only record what is scheduled; tests fire them by hand.
#[derive(Clone, Default)]
pub struct RecordingTimers {
    inner: Arc<Mutex<TimerState>>,
}

#[derive(Default)]
struct TimerState {
    next: u64,
    active: HashMap<TimerHandle, (TimerPurpose, Duration)>,
    scheduled_total: usize,
}

impl RecordingTimers {
    pub fn active(&self, purpose: TimerPurpose) -> usize {
        self.inner
            .lock()
            .unwrap()
            .active
            .values()
            .filter(|(p, _)| *p == purpose)
            .count()
    }

    pub fn period(&self, purpose: TimerPurpose) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .active
            .values()
            .find(|(p, _)| *p == purpose)
            .map(|(_, d)| *d)
    }

    /// Handle of the live timer for `purpose`, if one is scheduled.
    pub fn handle(&self, purpose: TimerPurpose) -> Option<TimerHandle> {
        self.inner
            .lock()
            .unwrap()
            .active
            .iter()
            .find(|(_, (p, _))| *p == purpose)
            .map(|(h, _)| *h)
    }

    pub fn scheduled_total(&self) -> usize {
        self.inner.lock().unwrap().scheduled_total
    }

    fn schedule(&self, delay: Duration, purpose: TimerPurpose) -> TimerHandle {
        let mut state = self.inner.lock().unwrap();
        state.next += 1;
        let handle = TimerHandle(state.next);
        state.active.insert(handle, (purpose, delay));
        state.scheduled_total += 1;
        handle
    }
}

impl Timers for RecordingTimers {
    fn set_interval(&mut self, period: Duration, purpose: TimerPurpose) -> TimerHandle {
        self.schedule(period, purpose)
    }

    fn set_timeout(&mut self, delay: Duration, purpose: TimerPurpose) -> TimerHandle {
        self.schedule(delay, purpose)
    }

    fn clear(&mut self, handle: TimerHandle) {
        self.inner.lock().unwrap().active.remove(&handle);
    }
}
