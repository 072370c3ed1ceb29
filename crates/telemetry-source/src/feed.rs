//! The simulator side of acquisition.

use std::time::Duration;

use crate::record::TelemetryRecord;

/// Result of one [`SimulatorFeed::poll`].
pub enum FeedPoll<'a> {
    /// The simulator became available.
    Connected,
    /// The simulator went away; cached data is stale.
    Disconnected,
    /// A new telemetry frame, valid until the next poll.
    Frame(&'a dyn TelemetryRecord),
    /// Nothing new within the timeout.
    Idle,
}

impl std::fmt::Debug for FeedPoll<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedPoll::Connected => f.write_str("Connected"),
            FeedPoll::Disconnected => f.write_str("Disconnected"),
            FeedPoll::Frame(_) => f.write_str("Frame(..)"),
            FeedPoll::Idle => f.write_str("Idle"),
        }
    }
}

/// A live telemetry feed polled from the acquisition thread.
///
/// Implementations own their cadence: `poll` blocks for at most `timeout`
/// waiting for the next event.
pub trait SimulatorFeed: Send {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Begin the subscription. Called once before polling starts.
    fn open(&mut self);

    fn poll(&mut self, timeout: Duration) -> FeedPoll<'_>;

    fn is_connected(&self) -> bool;

    /// End the subscription and release simulator resources.
    fn close(&mut self);
}
