use std::sync::Arc;

use omg_telemetry_core::TelemetrySnapshot;
use parking_lot::Mutex;

/// Single-slot, last-write-wins snapshot cache.
///
/// The lock only guards an `Arc` swap or clone, so writers never wait on a
/// reader doing I/O and readers always see a whole snapshot.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    latest: Mutex<Option<Arc<TelemetrySnapshot>>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached snapshot.
    pub fn publish(&self, snapshot: TelemetrySnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.latest.lock() = Some(snapshot);
    }

    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.latest.lock().clone()
    }

    pub fn clear(&self) {
        let previous = self.latest.lock().take();
        drop(previous);
    }

    pub fn is_empty(&self) -> bool {
        self.latest.lock().is_none()
    }
}
