//! The relay timer task and the control surface used by the front end.

use std::sync::Arc;

use omg_telemetry_core::ConnectionState;
use omg_telemetry_source::SnapshotSource;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;
use crate::config::{BroadcastPort, RelayConfig, UpdateRate, normalize_address};
use crate::error::RelayError;
use crate::relay_loop::RelayLoop;

struct TimerTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs a [`RelayLoop`] on a tokio interval and exposes start/stop and live
/// reconfiguration.
pub struct RelayService {
    relay: Arc<RelayLoop>,
    rate_tx: watch::Sender<UpdateRate>,
    task: Mutex<Option<TimerTask>>,
}

fn ticker(rate: UpdateRate) -> Interval {
    let period = rate.interval();
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn run_timer(
    relay: Arc<RelayLoop>,
    mut rate_rx: watch::Receiver<UpdateRate>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut events = relay.source().subscribe();
    let mut events_open = true;
    let mut interval = ticker(*rate_rx.borrow_and_update());
    debug!(rate_hz = rate_rx.borrow().hz(), "relay timer started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            changed = rate_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let rate = *rate_rx.borrow_and_update();
                interval = ticker(rate);
                info!(rate_hz = rate.hz(), "update rate changed");
            }

            event = events.recv(), if events_open => match event {
                Ok(event) => relay.handle_source_event(event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "source events lagged"),
                Err(RecvError::Closed) => events_open = false,
            },

            _ = interval.tick() => {
                relay.tick();
            }
        }
    }
    debug!("relay timer stopped");
}

impl RelayService {
    pub fn new(relay: RelayLoop, rate: UpdateRate) -> Self {
        let (rate_tx, _) = watch::channel(rate);
        Self {
            relay: Arc::new(relay),
            rate_tx,
            task: Mutex::new(None),
        }
    }

    /// Bind the broadcaster and apply port, rate and unicast settings.
    pub fn from_config(
        config: &RelayConfig,
        source: Arc<dyn SnapshotSource>,
    ) -> Result<Self, RelayError> {
        let broadcaster = Broadcaster::bind(config.broadcast_port)?;
        let relay = RelayLoop::new(source, broadcaster);
        relay.set_unicast_address(config.unicast_address.clone());
        Ok(Self::new(relay, config.update_rate))
    }

    pub fn relay(&self) -> &RelayLoop {
        &self.relay
    }

    /// Start acquisition and the timer. Returns false if already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() || !self.relay.start() {
            return false;
        }
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_timer(
            Arc::clone(&self.relay),
            self.rate_tx.subscribe(),
            shutdown_rx,
        ));
        *task = Some(TimerTask { shutdown, handle });
        true
    }

    /// Stop the timer, let an in-flight tick finish, then stop the relay and
    /// acquisition. Returns false if not running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.task.lock().take() else {
            return false;
        };
        if task.shutdown.send(()).is_err() {
            debug!("relay timer already finished");
        }
        if let Err(err) = task.handle.await {
            warn!(error = %err, "relay timer task failed");
        }

        let relay = Arc::clone(&self.relay);
        match tokio::task::spawn_blocking(move || relay.stop()).await {
            Ok(stopped) => debug!(stopped, "relay loop stopped"),
            Err(err) => warn!(error = %err, "relay shutdown task failed"),
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.relay.is_running()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.relay.connection_state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.relay.subscribe_state()
    }

    pub fn rate(&self) -> UpdateRate {
        *self.rate_tx.borrow()
    }

    pub fn port(&self) -> u16 {
        self.relay.broadcaster().port()
    }

    /// Retarget broadcasts; applies to the next tick.
    pub fn update_broadcast_port(&self, port: u32) -> Result<(), RelayError> {
        let port = BroadcastPort::new(port)?;
        self.relay.broadcaster().update_port(port);
        Ok(())
    }

    /// Change the tick rate without stopping; applies from the next tick.
    pub fn update_rate(&self, hz: u32) -> Result<(), RelayError> {
        let rate = UpdateRate::new(hz)?;
        self.rate_tx.send_if_modified(|current| {
            let changed = *current != rate;
            *current = rate;
            changed
        });
        Ok(())
    }

    pub fn set_unicast_address(&self, address: Option<String>) {
        self.relay.set_unicast_address(normalize_address(address));
    }
}

impl Drop for RelayService {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
        self.relay.stop();
    }
}

impl std::fmt::Debug for RelayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayService")
            .field("relay", &self.relay)
            .field("rate", &self.rate())
            .finish_non_exhaustive()
    }
}
