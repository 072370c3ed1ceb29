//! Simulator telemetry acquisition for OneMoreGauge.
//!
//! A [`SimulatorFeed`] produces raw frames on a dedicated thread; the
//! [`TelemetrySource`] turns each frame into a [`TelemetrySnapshot`] and keeps
//! only the latest one. Consumers read that snapshot without ever blocking the
//! acquisition thread.
//!
//! Feeds:
//! - [`IRacingFeed`]: the live simulator over IRSDK shared memory (Windows).
//! - [`SyntheticFeed`]: a generated car lapping a circuit.
//! - [`ScriptedFeed`]: events pushed by hand, for tests.
//!
//! [`TelemetrySnapshot`]: omg_telemetry_core::TelemetrySnapshot

pub mod acquisition;
pub mod feed;
pub mod iracing;
pub mod record;
pub mod scripted;
pub mod slot;
pub mod source;
pub mod synthetic;

pub use acquisition::{DEFAULT_MAX_RPM, FALLBACK_REFERENCE_LAP_S, build_snapshot};
pub use feed::{FeedPoll, SimulatorFeed};
pub use iracing::IRacingFeed;
pub use record::{FieldError, FieldValue, RecordMap, SessionInfo, TelemetryRecord};
pub use scripted::{ScriptedFeed, ScriptedFeedHandle, scripted_feed};
pub use slot::SnapshotSlot;
pub use source::{
    POLL_TIMEOUT, SnapshotSource, SourceError, SourceEvent, SourceStats, TelemetrySource,
};
pub use synthetic::SyntheticFeed;
