//! Test doubles shared by the relay integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use omg_relay::{BroadcastPort, Broadcaster, DatagramTransport, RelayLoop};
use omg_telemetry_core::TelemetrySnapshot;
use omg_telemetry_source::{SnapshotSource, SourceError, SourceEvent};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// A source whose snapshot and connectivity are set directly by the test.
pub struct ManualSource {
    snapshot: Mutex<Option<Arc<TelemetrySnapshot>>>,
    events: broadcast::Sender<SourceEvent>,
    fail_start: AtomicBool,
    running: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ManualSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(None),
            events: broadcast::channel(16).0,
            fail_start: AtomicBool::new(false),
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub fn set_snapshot(&self, snapshot: Option<TelemetrySnapshot>) {
        *self.snapshot.lock() = snapshot.map(Arc::new);
    }

    /// Drop the cached snapshot and notify subscribers, like a simulator
    /// shutting down.
    pub fn disconnect(&self) {
        *self.snapshot.lock() = None;
        if self.events.send(SourceEvent::Disconnected).is_err() {
            tracing::trace!("no subscribers for disconnect");
        }
    }

    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ManualSource {
    fn start(&self) -> Result<(), SourceError> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(SourceError::FeedLost);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        *self.snapshot.lock() = None;
    }

    fn snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshot.lock().clone()
    }

    fn connected(&self) -> bool {
        self.snapshot.lock().is_some()
    }

    fn subscribe(&self) -> broadcast::Receiver<SourceEvent> {
        self.events.subscribe()
    }
}

/// Records every datagram instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

/// Lets a test keep a handle on the transport it gave to a broadcaster.
pub struct SharedTransport(pub Arc<RecordingTransport>);

impl DatagramTransport for SharedTransport {
    fn send_datagram(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NetworkUnreachable, "no route"));
        }
        self.0.sent.lock().push((payload.to_vec(), target));
        Ok(payload.len())
    }
}

pub fn recording_broadcaster() -> (Broadcaster, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let broadcaster = Broadcaster::with_transport(
        Box::new(SharedTransport(Arc::clone(&transport))),
        BroadcastPort::DEFAULT,
    );
    (broadcaster, transport)
}

pub fn manual_relay() -> (RelayLoop, Arc<ManualSource>, Arc<RecordingTransport>) {
    let source = ManualSource::new();
    let (broadcaster, transport) = recording_broadcaster();
    let relay = RelayLoop::new(Arc::clone(&source) as Arc<dyn SnapshotSource>, broadcaster);
    (relay, source, transport)
}
