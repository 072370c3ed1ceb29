//! A feed driven by hand, for tests and replay tooling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use omg_telemetry_core::TelemetrySnapshot;

use crate::feed::{FeedPoll, SimulatorFeed};
use crate::record::RecordMap;

#[derive(Debug)]
enum ScriptEvent {
    Connect,
    Disconnect,
    Frame(Box<RecordMap>),
}

#[derive(Debug, Default)]
struct ScriptState {
    opened: AtomicBool,
    closes: AtomicUsize,
}

/// Feed whose events are pushed through a [`ScriptedFeedHandle`].
#[derive(Debug)]
pub struct ScriptedFeed {
    events: Receiver<ScriptEvent>,
    state: Arc<ScriptState>,
    connected: bool,
    frame: RecordMap,
}

/// Sending side of a [`ScriptedFeed`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScriptedFeedHandle {
    events: Sender<ScriptEvent>,
    state: Arc<ScriptState>,
}

/// Create a scripted feed and the handle that drives it.
pub fn scripted_feed() -> (ScriptedFeed, ScriptedFeedHandle) {
    let (tx, rx) = channel::unbounded();
    let state = Arc::new(ScriptState::default());
    let feed = ScriptedFeed {
        events: rx,
        state: Arc::clone(&state),
        connected: false,
        frame: RecordMap::new(),
    };
    (feed, ScriptedFeedHandle { events: tx, state })
}

impl SimulatorFeed for ScriptedFeed {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self) {
        self.state.opened.store(true, Ordering::Release);
    }

    fn poll(&mut self, timeout: Duration) -> FeedPoll<'_> {
        match self.events.recv_timeout(timeout) {
            Ok(ScriptEvent::Connect) => {
                self.connected = true;
                FeedPoll::Connected
            }
            Ok(ScriptEvent::Disconnect) => {
                self.connected = false;
                FeedPoll::Disconnected
            }
            Ok(ScriptEvent::Frame(record)) => {
                self.frame = *record;
                FeedPoll::Frame(&self.frame)
            }
            Err(RecvTimeoutError::Timeout) => FeedPoll::Idle,
            Err(RecvTimeoutError::Disconnected) => {
                // Every handle is gone; keep the caller's cadence.
                std::thread::sleep(timeout);
                FeedPoll::Idle
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.state.opened.store(false, Ordering::Release);
        self.state.closes.fetch_add(1, Ordering::AcqRel);
        self.connected = false;
    }
}

impl ScriptedFeedHandle {
    fn push(&self, event: ScriptEvent) {
        // The feed is only dropped together with its source, after which
        // nobody observes the result.
        if self.events.send(event).is_err() {
            tracing::trace!("scripted feed dropped");
        }
    }

    pub fn connect(&self) {
        self.push(ScriptEvent::Connect);
    }

    pub fn disconnect(&self) {
        self.push(ScriptEvent::Disconnect);
    }

    pub fn frame(&self, record: RecordMap) {
        self.push(ScriptEvent::Frame(Box::new(record)));
    }

    /// Push a frame that acquires back into `snapshot`.
    pub fn snapshot(&self, snapshot: &TelemetrySnapshot) {
        self.frame(RecordMap::from_snapshot(snapshot));
    }

    /// Whether the feed is between `open` and `close`.
    pub fn is_open(&self) -> bool {
        self.state.opened.load(Ordering::Acquire)
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::Acquire)
    }
}
