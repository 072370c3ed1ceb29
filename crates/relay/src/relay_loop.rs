//! One relay tick and the connection-state machine around it.

use std::sync::Arc;

use omg_telemetry_core::ConnectionState;
use omg_telemetry_packet::encode;
use omg_telemetry_source::{SnapshotSource, SourceEvent};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broadcaster::{Broadcaster, SendOutcome};

/// What a single [`RelayLoop::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The relay is stopped; nothing happened.
    Idle,
    /// Running, but the source had no snapshot.
    NoData,
    /// A packet was encoded and handed to the broadcaster.
    Relayed(SendOutcome),
}

#[derive(Debug)]
struct Status {
    running: bool,
    connection: ConnectionState,
}

/// Pulls snapshots from a [`SnapshotSource`] and relays them.
///
/// State changes only on `start`, `stop`, a tick, or a source disconnect.
/// Every change is written under one lock together with the running flag, and
/// mirrored into a `watch` channel for observers.
pub struct RelayLoop {
    source: Arc<dyn SnapshotSource>,
    broadcaster: Broadcaster,
    status: Mutex<Status>,
    state_tx: watch::Sender<ConnectionState>,
    unicast: RwLock<Option<String>>,
}

impl RelayLoop {
    pub fn new(source: Arc<dyn SnapshotSource>, broadcaster: Broadcaster) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            source,
            broadcaster,
            status: Mutex::new(Status {
                running: false,
                connection: ConnectionState::Disconnected,
            }),
            state_tx,
            unicast: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Arc<dyn SnapshotSource> {
        &self.source
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn is_running(&self) -> bool {
        self.status.lock().running
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.status.lock().connection
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Relay to one host instead of broadcasting. `None` restores broadcast.
    pub fn set_unicast_address(&self, address: Option<String>) {
        match &address {
            Some(address) => info!(address = %address, "relaying to unicast address"),
            None => info!("relaying to broadcast address"),
        }
        *self.unicast.write() = address;
    }

    pub fn unicast_address(&self) -> Option<String> {
        self.unicast.read().clone()
    }

    fn transition(&self, status: &mut Status, next: ConnectionState) {
        if status.connection == next {
            return;
        }
        debug!(from = %status.connection, to = %next, "connection state changed");
        status.connection = next;
        self.state_tx.send_replace(next);
    }

    /// Begin relaying. Returns false if already running or if acquisition
    /// could not be started.
    pub fn start(&self) -> bool {
        let mut status = self.status.lock();
        if status.running {
            return false;
        }
        if let Err(err) = self.source.start() {
            warn!(error = %err, "telemetry source failed to start");
            return false;
        }
        status.running = true;
        self.transition(&mut status, ConnectionState::Waiting);
        info!(endpoint = %self.broadcaster.target(), "relay started");
        true
    }

    /// Stop relaying and release acquisition. Returns false if not running.
    pub fn stop(&self) -> bool {
        {
            let mut status = self.status.lock();
            if !status.running {
                return false;
            }
            status.running = false;
            self.transition(&mut status, ConnectionState::Disconnected);
        }
        self.source.stop();
        info!("relay stopped");
        true
    }

    /// One acquire, encode, send cycle.
    pub fn tick(&self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }

        let (outcome, next) = match self.source.snapshot() {
            Some(snapshot) => {
                let packet = encode(&snapshot);
                let sent = match self.unicast_address() {
                    Some(address) => {
                        self.broadcaster
                            .send_to(&packet, &address, self.broadcaster.port())
                    }
                    None => self.broadcaster.send(&packet),
                };
                (TickOutcome::Relayed(sent), ConnectionState::Connected)
            }
            None => (TickOutcome::NoData, ConnectionState::Waiting),
        };

        let mut status = self.status.lock();
        // A stop that landed mid-tick wins.
        if status.running {
            self.transition(&mut status, next);
        }
        outcome
    }

    pub fn handle_source_event(&self, event: SourceEvent) {
        match event {
            SourceEvent::Disconnected => {
                let mut status = self.status.lock();
                if status.running {
                    self.transition(&mut status, ConnectionState::Waiting);
                }
            }
            SourceEvent::Connected => debug!("simulator connected; waiting for data"),
        }
    }
}

impl std::fmt::Debug for RelayLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status.lock();
        f.debug_struct("RelayLoop")
            .field("running", &status.running)
            .field("connection", &status.connection)
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}
