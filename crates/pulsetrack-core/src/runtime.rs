//! Tokio driver for a [`VisitTracker`].
//!
//! The tracker is single-threaded by contract, so the driver gives it one
//! task and one inbox. Host code and timers both push into the same unbounded
//! channel; the task applies commands strictly in arrival order. Shutdown
//! goes through a `watch` channel and always runs `teardown()` before the
//! task exits, so the final `page_exit` is attempted even when every handle
//! is simply dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::host::{Clock, PageContext, TimerHandle, TimerPurpose, Timers};
use crate::payload::EventKind;
use crate::tracker::{Signal, TrackerConfig, TrackerSnapshot, VisitTracker};
use crate::transport::{DeliveryOutcome, Transport};

/// Shortest period handed to `tokio::time::interval`, which rejects zero.
const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

enum Command {
    Initialize,
    Teardown,
    Signal(Signal),
    Record(EventKind, oneshot::Sender<DeliveryOutcome>),
    Snapshot(oneshot::Sender<TrackerSnapshot>),
}

/// [`Timers`] backed by tokio tasks that post `TimerFired` into the
/// tracker's inbox.
struct TokioTimers {
    inbox: mpsc::UnboundedSender<Command>,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioTimers {
    fn new(inbox: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            inbox,
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    fn next_handle(&mut self) -> TimerHandle {
        self.tasks.retain(|_, t| !t.is_finished());
        self.next_id = self.next_id.wrapping_add(1);
        TimerHandle(self.next_id)
    }
}

impl Timers for TokioTimers {
    fn set_interval(&mut self, period: Duration, purpose: TimerPurpose) -> TimerHandle {
        let period = period.max(MIN_TIMER_PERIOD);
        let handle = self.next_handle();
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if inbox
                    .send(Command::Signal(Signal::TimerFired(purpose, handle)))
                    .is_err()
                {
                    return;
                }
            }
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn set_timeout(&mut self, delay: Duration, purpose: TimerPurpose) -> TimerHandle {
        let handle = self.next_handle();
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(Command::Signal(Signal::TimerFired(purpose, handle)));
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn clear(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Cloneable handle used by host code to drive a running tracker.
///
/// Dropping the last handle shuts the tracker down.
#[derive(Clone)]
pub struct TrackerHandle {
    inbox: mpsc::UnboundedSender<Command>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl TrackerHandle {
    pub fn initialize(&self) {
        self.send(Command::Initialize);
    }

    pub fn teardown(&self) {
        self.send(Command::Teardown);
    }

    pub fn signal(&self, signal: Signal) {
        self.send(Command::Signal(signal));
    }

    /// Send a diagnostic event and wait for its delivery outcome.
    /// Returns `Dropped` if the tracker task has already stopped.
    pub async fn record_event(&self, kind: EventKind) -> DeliveryOutcome {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Record(kind, tx));
        rx.await.unwrap_or(DeliveryOutcome::Dropped)
    }

    /// Current tracker state, or `None` if the task has stopped.
    pub async fn snapshot(&self) -> Option<TrackerSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx));
        rx.await.ok()
    }

    /// Ask the tracker task to tear down and stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn send(&self, command: Command) {
        if self.inbox.send(command).is_err() {
            debug!("tracker task already stopped, command discarded");
        }
    }
}

impl std::fmt::Debug for TrackerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerHandle").finish_non_exhaustive()
    }
}

/// A tracker running on its own tokio task.
#[derive(Debug)]
pub struct TrackerRuntime {
    handle: TrackerHandle,
    task: JoinHandle<()>,
}

impl TrackerRuntime {
    /// Spawn a tracker on the current tokio runtime.
    ///
    /// The tracker is not initialized yet; call
    /// [`TrackerHandle::initialize`] once the page is ready.
    #[must_use]
    pub fn spawn(
        config: TrackerConfig,
        page: Option<Box<dyn PageContext>>,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let timers = TokioTimers::new(inbox_tx.clone());
        let tracker = VisitTracker::new(config, page, clock, Box::new(timers), transport);

        let task = tokio::spawn(run(tracker, inbox_rx, shutdown_rx));

        Self {
            handle: TrackerHandle {
                inbox: inbox_tx,
                shutdown: Arc::new(shutdown_tx),
            },
            task,
        }
    }

    #[must_use]
    pub fn handle(&self) -> TrackerHandle {
        self.handle.clone()
    }

    /// Tear the tracker down and wait for its task to finish.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        drop(self.handle);
        let _ = self.task.await;
    }
}

async fn run(
    mut tracker: VisitTracker,
    mut inbox: mpsc::UnboundedReceiver<Command>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            Some(command) = inbox.recv() => apply(&mut tracker, command),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    // Drain anything posted before shutdown so ordering holds.
    while let Ok(command) = inbox.try_recv() {
        apply(&mut tracker, command);
    }
    tracker.teardown();
    info!("tracker task stopped");
}

fn apply(tracker: &mut VisitTracker, command: Command) {
    match command {
        Command::Initialize => tracker.initialize(),
        Command::Teardown => tracker.teardown(),
        Command::Signal(signal) => tracker.handle(signal),
        Command::Record(kind, reply) => {
            let _ = reply.send(tracker.record_event(kind));
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(tracker.snapshot());
        }
    }
}
