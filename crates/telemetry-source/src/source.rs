//! Acquisition thread and the latest-value telemetry source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use omg_telemetry_core::TelemetrySnapshot;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::acquisition::build_snapshot;
use crate::feed::{FeedPoll, SimulatorFeed};
use crate::slot::SnapshotSlot;

/// Upper bound on how long the acquisition thread blocks in one poll.
/// `stop` returns within roughly this long.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(50);

const EVENT_CAPACITY: usize = 16;

/// Connectivity notifications from a [`SnapshotSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Connected,
    Disconnected,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("simulator feed was lost when the acquisition thread panicked")]
    FeedLost,
}

/// What the relay loop needs from a telemetry source.
pub trait SnapshotSource: Send + Sync {
    /// Begin acquisition. Calling it while already started is a no-op.
    fn start(&self) -> Result<(), SourceError>;

    /// End acquisition and drop any cached snapshot. Idempotent.
    fn stop(&self);

    /// The latest snapshot, or `None` before the first frame or after a
    /// disconnect.
    fn snapshot(&self) -> Option<Arc<TelemetrySnapshot>>;

    /// Whether the simulator currently reports itself connected.
    fn connected(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent>;
}

/// Acquisition counters.
#[derive(Debug, Default)]
pub struct SourceStats {
    published: AtomicU64,
    rejected: AtomicU64,
}

impl SourceStats {
    /// Frames turned into a snapshot.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames dropped because a required field could not be read.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

struct Shared {
    slot: SnapshotSlot,
    connected: AtomicBool,
    running: AtomicBool,
    events: broadcast::Sender<SourceEvent>,
    stats: SourceStats,
}

impl Shared {
    fn emit(&self, event: SourceEvent) {
        if self.events.send(event).is_err() {
            trace!(?event, "no source event subscribers");
        }
    }

    fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::AcqRel);
        match (was, connected) {
            (false, true) => self.emit(SourceEvent::Connected),
            (true, false) => {
                self.slot.clear();
                self.emit(SourceEvent::Disconnected);
            }
            _ => {}
        }
    }
}

enum Lifecycle {
    Idle(Box<dyn SimulatorFeed>),
    Running(JoinHandle<Box<dyn SimulatorFeed>>),
    Lost,
}

/// Thread-safe latest-value cache fed by a [`SimulatorFeed`].
///
/// `start` moves the feed onto a dedicated `omg-acquisition` thread which
/// publishes a snapshot for every frame that reads cleanly. `stop` joins that
/// thread and takes the feed back, so the source can be restarted.
pub struct TelemetrySource {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    feed_name: String,
}

impl TelemetrySource {
    pub fn new(feed: Box<dyn SimulatorFeed>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let feed_name = feed.name().to_string();
        Self {
            shared: Arc::new(Shared {
                slot: SnapshotSlot::new(),
                connected: AtomicBool::new(false),
                running: AtomicBool::new(false),
                events,
                stats: SourceStats::default(),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle(feed)),
            feed_name,
        }
    }

    pub fn feed_name(&self) -> &str {
        &self.feed_name
    }

    pub fn stats(&self) -> &SourceStats {
        &self.shared.stats
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    fn acquisition_main(
        shared: &Shared,
        mut feed: Box<dyn SimulatorFeed>,
        name: &str,
    ) -> Box<dyn SimulatorFeed> {
        feed.open();
        debug!(feed = name, "acquisition thread started");

        while shared.running.load(Ordering::Acquire) {
            // A frame never changes the feed's connectivity.
            let connected = feed.is_connected();
            match feed.poll(POLL_TIMEOUT) {
                FeedPoll::Connected => {
                    info!(feed = name, "simulator connected");
                }
                FeedPoll::Disconnected => {
                    info!(feed = name, "simulator disconnected");
                    shared.slot.clear();
                    shared.set_connected(false);
                }
                FeedPoll::Frame(_) if !connected => {
                    trace!(feed = name, "frame before connect ignored");
                }
                FeedPoll::Frame(record) => match build_snapshot(record) {
                    Ok(snapshot) => {
                        shared.slot.publish(snapshot);
                        shared.stats.published.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(err) => {
                        shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                        trace!(error = %err, "telemetry frame rejected");
                    }
                },
                FeedPoll::Idle => {}
            }
            shared.set_connected(feed.is_connected());
        }

        feed.close();
        debug!(feed = name, "acquisition thread stopped");
        feed
    }
}

impl SnapshotSource for TelemetrySource {
    fn start(&self) -> Result<(), SourceError> {
        let mut lifecycle = self.lifecycle.lock();
        let feed = match std::mem::replace(&mut *lifecycle, Lifecycle::Lost) {
            Lifecycle::Idle(feed) => feed,
            running @ Lifecycle::Running(_) => {
                *lifecycle = running;
                return Ok(());
            }
            Lifecycle::Lost => return Err(SourceError::FeedLost),
        };

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let name = self.feed_name.clone();
        // On spawn failure the feed is dropped with the closure and the
        // source stays unusable.
        let handle = thread::Builder::new()
            .name("omg-acquisition".to_string())
            .spawn(move || Self::acquisition_main(&shared, feed, &name))
            .inspect_err(|_| self.shared.running.store(false, Ordering::Release))?;

        *lifecycle = Lifecycle::Running(handle);
        info!(feed = %self.feed_name, "telemetry source started");
        Ok(())
    }

    fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let handle = match std::mem::replace(&mut *lifecycle, Lifecycle::Lost) {
            Lifecycle::Running(handle) => handle,
            other => {
                *lifecycle = other;
                return;
            }
        };

        self.shared.running.store(false, Ordering::Release);
        match handle.join() {
            Ok(feed) => *lifecycle = Lifecycle::Idle(feed),
            Err(_) => warn!(feed = %self.feed_name, "acquisition thread panicked"),
        }

        self.shared.set_connected(false);
        self.shared.slot.clear();
        info!(feed = %self.feed_name, "telemetry source stopped");
    }

    fn snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.shared.slot.latest()
    }

    fn connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.shared.events.subscribe()
    }
}

impl Drop for TelemetrySource {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TelemetrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySource")
            .field("feed", &self.feed_name)
            .field("connected", &self.connected())
            .finish_non_exhaustive()
    }
}
