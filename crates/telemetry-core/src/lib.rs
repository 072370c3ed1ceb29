//! Core telemetry types shared by the OneMoreGauge relay crates.
//!
//! ## Modules
//! - `snapshot` - The immutable [`TelemetrySnapshot`] and its tire/flag parts
//! - `state` - The relay's [`ConnectionState`] indicator

#![deny(static_mut_refs)]

pub mod snapshot;
pub mod state;

pub use snapshot::{
    Corner, SnapshotFlags, TelemetrySnapshot, TireReadings, TreadPoint, saturate_i8, saturate_i16,
};
pub use state::ConnectionState;
