//! OneMoreGauge relay: ticks a [`SnapshotSource`](omg_telemetry_source::SnapshotSource),
//! encodes each snapshot as an `OMG1` packet and sends it over UDP.
//!
//! [`RelayLoop`] is the synchronous state machine for one tick;
//! [`RelayService`] drives it from a tokio interval and is the control
//! surface used by the `omg-relay` binary.

pub mod broadcaster;
pub mod config;
pub mod console;
pub mod error;
pub mod relay_loop;
pub mod service;

pub use broadcaster::{
    BROADCAST_ADDR, BroadcastStats, Broadcaster, DatagramTransport, DropReason, SendOutcome,
};
pub use config::{BroadcastPort, RelayConfig, UpdateRate, normalize_address};
pub use console::{CommandError, ConsoleCommand, Reply, execute, parse_command, save_setting};
pub use error::RelayError;
pub use relay_loop::{RelayLoop, TickOutcome};
pub use service::RelayService;
