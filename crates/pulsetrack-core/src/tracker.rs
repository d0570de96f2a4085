//! The visit tracker.
//!
//! [`VisitTracker`] owns the telemetry state of one page view and turns host
//! signals into collector events:
//!
//! | Signal | Precondition | Effect |
//! |---|---|---|
//! | `initialize()` | not initialized | `page_open`, start heartbeat, Active |
//! | `VisibilityChanged` → hidden | Active | stop heartbeat, `tab_hidden`, Hidden |
//! | `VisibilityChanged` → visible | Hidden | start heartbeat, `tab_visible`, Active |
//! | `Blur` | Active, host not already hidden | stop heartbeat, `tab_hidden`, Hidden |
//! | `Focus` | Hidden, host visible | start heartbeat, Active |
//! | `BeforeUnload` / `PageHide` | exit latch open | latch, stop heartbeat, `page_exit` |
//! | heartbeat tick | Active | `heartbeat` |
//! | `teardown()` | exit latch open | same as `BeforeUnload`, then discard session |
//!
//! `visibilitychange` is authoritative; blur/focus only cover browsers that
//! skip it and no-op once the transition has been reflected. After the exit
//! latch fires every signal is ignored until teardown.
//!
//! No operation returns an error. Failures are logged and the page never
//! notices.

use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::device::DeviceClass;
use crate::host::{Clock, PageContext, TimerHandle, TimerPurpose, Timers, Visibility};
use crate::identity::VisitIdentity;
use crate::payload::{EventKind, TrackingPayload};
use crate::session::{ExitTrigger, Lifecycle, VisitSession};
use crate::transport::{DeliveryOutcome, Dispatcher, Transport, resolve_endpoint};

/// Collector path used when none is configured, relative to the page origin.
pub const DEFAULT_ENDPOINT: &str = "/api/track";

/// Time between heartbeat events while the page is in front.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Minimum spacing between scroll-depth recomputations.
pub const SCROLL_THROTTLE: Duration = Duration::from_millis(100);

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Collector endpoint every event is posted to. A relative endpoint is
    /// resolved against the page URL when a session starts.
    pub endpoint: String,
    /// Per-deployment slug sent as `lead_magnet_slug`.
    pub source_slug: Option<String>,
    /// Heartbeat period.
    pub heartbeat_interval: Duration,
    /// Scroll throttle window; never below [`SCROLL_THROTTLE`].
    pub scroll_throttle: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            source_slug: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            scroll_throttle: SCROLL_THROTTLE,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_source_slug(mut self, slug: impl Into<String>) -> Self {
        self.source_slug = Some(slug.into());
        self
    }

    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub fn with_scroll_throttle(mut self, window: Duration) -> Self {
        self.scroll_throttle = window.max(SCROLL_THROTTLE);
        self
    }
}

/// Host signals the tracker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The document scrolled.
    Scroll,
    /// `visibilitychange`; the new state is read from the page context.
    VisibilityChanged,
    /// The window lost focus.
    Blur,
    /// The window regained focus.
    Focus,
    /// `beforeunload`.
    BeforeUnload,
    /// `pagehide` (the reliable unload signal on mobile Safari).
    PageHide,
    /// A timer scheduled through [`Timers`] fired. Ticks whose handle is no
    /// longer the live timer for that purpose are ignored.
    TimerFired(TimerPurpose, TimerHandle),
}

/// Debug view of the tracker, serializable for inspection tooling.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub initialized: bool,
    pub session_start: Option<String>,
    pub time_on_page_seconds: u64,
    pub max_scroll_percent: u8,
    pub current_scroll_percent: Option<u8>,
    pub identity: Option<VisitIdentity>,
    /// Whether the visit carries an id or any UTM field.
    pub attributed: bool,
    pub device_type: Option<DeviceClass>,
    pub source_slug: Option<String>,
    pub lifecycle: Option<Lifecycle>,
    pub exit_fired: bool,
    pub exit_trigger: Option<ExitTrigger>,
    pub heartbeat_running: bool,
    pub visibility: Option<Visibility>,
}

/// Visit telemetry for one page view.
pub struct VisitTracker {
    config: TrackerConfig,
    page: Option<Box<dyn PageContext>>,
    clock: Arc<dyn Clock>,
    timers: Box<dyn Timers>,
    dispatcher: Dispatcher,
    session: Option<VisitSession>,
}

impl VisitTracker {
    /// Build a tracker. Pass `page: None` when there is no browsing context;
    /// such a tracker accepts every call and does nothing.
    #[must_use]
    pub fn new(
        config: TrackerConfig,
        page: Option<Box<dyn PageContext>>,
        clock: Arc<dyn Clock>,
        timers: Box<dyn Timers>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.endpoint.clone(), transport);
        Self {
            config,
            page,
            clock,
            timers,
            dispatcher,
            session: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// The live session, if initialized.
    #[must_use]
    pub fn session(&self) -> Option<&VisitSession> {
        self.session.as_ref()
    }

    /// Start tracking this page view. Idempotent.
    pub fn initialize(&mut self) {
        if self.session.is_some() {
            debug!("tracker already initialized, skipping");
            return;
        }
        let Some(page) = self.page.as_ref() else {
            warn!("no browsing context, tracker not initialized");
            return;
        };

        let started_at = self.clock.now();
        let href = page.href();
        let identity = VisitIdentity::from_page_url(&href);
        let device = DeviceClass::from_user_agent(&page.user_agent());
        let endpoint = resolve_endpoint(&self.config.endpoint, &href);

        info!(
            id = identity.id.as_deref().unwrap_or("(none)"),
            utm_source = identity.utm_source.as_deref().unwrap_or("(none)"),
            utm_medium = identity.utm_medium.as_deref().unwrap_or("(none)"),
            utm_campaign = identity.utm_campaign.as_deref().unwrap_or("(none)"),
            utm_content = identity.utm_content.as_deref().unwrap_or("(none)"),
            attributed = identity.is_attributed(),
            device_type = %device,
            source_slug = self.config.source_slug.as_deref().unwrap_or("(none)"),
            %endpoint,
            "visit tracking initialized"
        );

        self.dispatcher = self.dispatcher.with_endpoint(endpoint);

        self.session = Some(VisitSession::new(started_at, identity, device));
        self.emit(EventKind::PageOpen);
        self.start_heartbeat();
    }

    /// Stop tracking. Fires a final `page_exit` if none has been sent.
    /// Idempotent, and a no-op before [`initialize`](Self::initialize).
    pub fn teardown(&mut self) {
        if self.session.is_none() {
            trace!("teardown without live session ignored");
            return;
        }

        self.exit(ExitTrigger::Teardown);
        self.stop_heartbeat();
        self.cancel_scroll_timer();
        self.session = None;
        info!("visit tracking torn down");
    }

    /// Build and send an event from the current session state.
    ///
    /// `page_exit` goes through the exit latch like every other exit path,
    /// so at most one is ever sent. Without a session the event is dropped.
    pub fn record_event(&mut self, kind: EventKind) -> DeliveryOutcome {
        if kind == EventKind::PageExit {
            return self
                .exit(ExitTrigger::Diagnostic)
                .unwrap_or(DeliveryOutcome::Dropped);
        }
        self.emit(kind)
    }

    /// React to one host signal.
    pub fn handle(&mut self, signal: Signal) {
        let Some(session) = self.session.as_ref() else {
            trace!(?signal, "signal before initialize ignored");
            return;
        };
        if session.exit_fired() {
            trace!(?signal, "signal after exit ignored");
            return;
        }

        match signal {
            Signal::Scroll => self.on_scroll(),
            Signal::TimerFired(TimerPurpose::ScrollThrottle, handle) => self.on_scroll_timer(handle),
            Signal::TimerFired(TimerPurpose::Heartbeat, handle) => self.on_heartbeat(handle),
            Signal::VisibilityChanged => self.on_visibility_change(),
            Signal::Blur => self.on_blur(),
            Signal::Focus => self.on_focus(),
            Signal::BeforeUnload => {
                self.exit(ExitTrigger::BeforeUnload);
            }
            Signal::PageHide => {
                self.exit(ExitTrigger::PageHide);
            }
        }
    }

    /// Current state for debugging.
    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        let now = self.clock.now();
        let session = self.session.as_ref();
        TrackerSnapshot {
            initialized: session.is_some(),
            session_start: session
                .map(|s| s.started_at().to_rfc3339_opts(SecondsFormat::Millis, true)),
            time_on_page_seconds: session.map_or(0, |s| s.time_on_page(now)),
            max_scroll_percent: session.map_or(0, VisitSession::max_scroll_percent),
            current_scroll_percent: self.page.as_ref().map(|p| p.scroll_metrics().percent()),
            identity: session.map(|s| s.identity().clone()),
            attributed: session.is_some_and(|s| s.identity().is_attributed()),
            device_type: session.map(VisitSession::device),
            source_slug: self.config.source_slug.clone(),
            lifecycle: session.map(VisitSession::lifecycle),
            exit_fired: session.is_some_and(VisitSession::exit_fired),
            exit_trigger: session.and_then(|s| s.exit.fired_by()),
            heartbeat_running: session.is_some_and(VisitSession::heartbeat_running),
            visibility: self.page.as_ref().map(|p| p.visibility()),
        }
    }

    // ── Signal handlers ──────────────────────────────────────────────

    fn on_scroll(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.scroll_timer.is_some() {
            return;
        }
        let window = self.config.scroll_throttle.max(SCROLL_THROTTLE);
        session.scroll_timer = Some(
            self.timers
                .set_timeout(window, TimerPurpose::ScrollThrottle),
        );
    }

    fn on_scroll_timer(&mut self, handle: TimerHandle) {
        let current = self.session.as_ref().and_then(|s| s.scroll_timer);
        if current == Some(handle) {
            self.flush_scroll();
        } else {
            trace!(?handle, "stale scroll timer ignored");
        }
    }

    fn flush_scroll(&mut self) {
        self.cancel_scroll_timer();
        let Some(percent) = self.page.as_ref().map(|p| p.scroll_metrics().percent()) else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            if session.observe_scroll(percent) {
                debug!(max_scroll_percent = percent, "new max scroll");
            }
        }
    }

    fn on_heartbeat(&mut self, handle: TimerHandle) {
        let beating = self
            .session
            .as_ref()
            .is_some_and(|s| s.lifecycle() == Lifecycle::Active && s.heartbeat == Some(handle));
        if beating {
            self.emit(EventKind::Heartbeat);
        } else {
            trace!(?handle, "stale heartbeat tick ignored");
        }
    }

    fn on_visibility_change(&mut self) {
        let Some(visibility) = self.page.as_ref().map(|p| p.visibility()) else {
            return;
        };
        let lifecycle = self.lifecycle();

        match (visibility, lifecycle) {
            (Visibility::Hidden, Some(Lifecycle::Active)) => {
                debug!("page hidden, sending tab_hidden");
                self.go_hidden();
            }
            (Visibility::Visible, Some(Lifecycle::Hidden)) => {
                debug!("page visible again, sending tab_visible");
                self.set_lifecycle(Lifecycle::Active);
                self.start_heartbeat();
                self.emit(EventKind::TabVisible);
            }
            _ => trace!(?visibility, ?lifecycle, "visibility transition already reflected"),
        }
    }

    fn on_blur(&mut self) {
        let host_hidden = self
            .page
            .as_ref()
            .is_some_and(|p| p.visibility() == Visibility::Hidden);
        if self.lifecycle() == Some(Lifecycle::Active) && !host_hidden {
            debug!("window blur, sending tab_hidden");
            self.go_hidden();
        } else {
            trace!(host_hidden, "blur already covered by visibilitychange");
        }
    }

    fn on_focus(&mut self) {
        let host_visible = self
            .page
            .as_ref()
            .is_some_and(|p| p.visibility() == Visibility::Visible);
        if self.lifecycle() == Some(Lifecycle::Hidden) && host_visible {
            debug!("window focus, resuming heartbeat");
            self.set_lifecycle(Lifecycle::Active);
            self.start_heartbeat();
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn go_hidden(&mut self) {
        self.set_lifecycle(Lifecycle::Hidden);
        self.stop_heartbeat();
        self.emit(EventKind::TabHidden);
    }

    /// Fire the exit latch for `trigger`. Returns the delivery outcome when
    /// this call won the latch, `None` otherwise.
    fn exit(&mut self, trigger: ExitTrigger) -> Option<DeliveryOutcome> {
        let session = self.session.as_mut()?;
        if !session.exit.fire(trigger) {
            debug!(?trigger, winner = ?session.exit.fired_by(), "page exit already fired, skipping");
            return None;
        }
        session.lifecycle = Lifecycle::Hidden;

        // Pick up a scroll still waiting on the throttle window.
        if session.scroll_timer.is_some() {
            self.flush_scroll();
        }
        self.stop_heartbeat();

        info!(?trigger, "page exit detected, sending final event");
        Some(self.emit(EventKind::PageExit))
    }

    fn emit(&self, kind: EventKind) -> DeliveryOutcome {
        let (Some(session), Some(page)) = (self.session.as_ref(), self.page.as_ref()) else {
            warn!(event_type = %kind, "no live session, event dropped");
            return DeliveryOutcome::Dropped;
        };

        let now = self.clock.now();
        let payload = TrackingPayload::new(
            kind,
            session.identity(),
            session.device(),
            session.time_on_page(now),
            session.max_scroll_percent(),
            now,
            page.href(),
            self.config.source_slug.clone(),
        );

        let outcome = self.dispatcher.deliver(&payload);
        debug!(
            event_type = %kind,
            ?outcome,
            time_on_page_seconds = payload.time_on_page_seconds,
            max_scroll_percent = payload.max_scroll_percent,
            "tracking event sent"
        );
        outcome
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn start_heartbeat(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.heartbeat.is_some() {
            trace!("heartbeat already running");
            return;
        }
        let interval = self.config.heartbeat_interval;
        session.heartbeat = Some(self.timers.set_interval(interval, TimerPurpose::Heartbeat));
        debug!(interval_secs = interval.as_secs(), "heartbeat started");
    }

    fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.session.as_mut().and_then(|s| s.heartbeat.take()) {
            self.timers.clear(handle);
            debug!("heartbeat stopped");
        }
    }

    fn cancel_scroll_timer(&mut self) {
        if let Some(handle) = self.session.as_mut().and_then(|s| s.scroll_timer.take()) {
            self.timers.clear(handle);
        }
    }

    fn lifecycle(&self) -> Option<Lifecycle> {
        self.session.as_ref().map(VisitSession::lifecycle)
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        if let Some(session) = self.session.as_mut() {
            session.lifecycle = lifecycle;
        }
    }
}

impl std::fmt::Debug for VisitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitTracker")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
