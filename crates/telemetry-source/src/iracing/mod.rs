//! iRacing telemetry over the IRSDK shared-memory interface.
//!
//! [`IRacingFeed`] probes for the simulator's memory map about once a second.
//! Once the header reports a connected simulator it paces itself on the
//! data-valid event (or the tick rate), copies the newest stable row and hands
//! it out as an [`IrsdkFrame`]. The variable layout and session metadata are
//! re-read only when the header says they changed.

pub mod image;
mod irsdk;
mod session;
#[cfg(windows)]
mod windows;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

pub use irsdk::{
    IrsdkError, IrsdkFrame, IrsdkHeader, MemoryOpener, MemoryView, VarBinding, VarLayout,
    VarType, read_session_yaml, read_stable_row,
};
pub use session::parse_session_info;
#[cfg(windows)]
pub use windows::SharedMemoryOpener;

use crate::feed::{FeedPoll, SimulatorFeed};

/// How often a missing simulator is looked for.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[cfg(not(windows))]
#[derive(Debug, Default)]
struct UnsupportedPlatform {
    warned: bool,
}

#[cfg(not(windows))]
impl MemoryOpener for UnsupportedPlatform {
    fn open(&mut self) -> Option<Box<dyn MemoryView>> {
        if !self.warned {
            self.warned = true;
            tracing::warn!("iRacing shared memory is only available on Windows");
        }
        None
    }
}

fn platform_opener() -> Box<dyn MemoryOpener> {
    #[cfg(windows)]
    {
        Box::new(SharedMemoryOpener)
    }
    #[cfg(not(windows))]
    {
        Box::new(UnsupportedPlatform::default())
    }
}

/// Caches that survive between frames of one connection.
#[derive(Debug, Default)]
struct FrameReader {
    signature: Option<(i32, i32, i32, i32)>,
    session_update: Option<i32>,
    last_tick: Option<i32>,
    frame: IrsdkFrame,
}

impl FrameReader {
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Refresh `frame` from the newest row. `Ok(false)` when the simulator has
    /// not produced a new tick since the last call.
    fn read(&mut self, view: &dyn MemoryView) -> Result<bool, IrsdkError> {
        let (header, tick) = read_stable_row(view, &mut self.frame.row)?;
        if self.last_tick == Some(tick) {
            return Ok(false);
        }

        let signature = header.layout_signature();
        if self.signature != Some(signature) {
            let layout = VarLayout::read(view, &header)?;
            debug!(vars = layout.len(), "IRSDK variable layout loaded");
            self.frame.layout = Arc::new(layout);
            self.signature = Some(signature);
        }

        if self.session_update != Some(header.session_info_update) {
            self.session_update = Some(header.session_info_update);
            self.refresh_session(view, &header);
        }

        self.last_tick = Some(tick);
        Ok(true)
    }

    fn refresh_session(&mut self, view: &dyn MemoryView, header: &IrsdkHeader) {
        let Some(yaml) = read_session_yaml(view, header) else {
            self.frame.session = None;
            return;
        };
        match parse_session_info(&yaml) {
            Ok(info) => {
                debug!(
                    red_line = ?info.red_line_rpm,
                    drivers = ?info.roster_size,
                    update = header.session_info_update,
                    "session info refreshed"
                );
                self.frame.session = Some(info);
            }
            Err(err) => debug!(error = %err, "session info unreadable; keeping previous"),
        }
    }
}

/// Live iRacing feed.
pub struct IRacingFeed {
    opener: Box<dyn MemoryOpener>,
    view: Option<Box<dyn MemoryView>>,
    connected: bool,
    probe_interval: Duration,
    next_probe: Option<Instant>,
    reader: FrameReader,
}

impl Default for IRacingFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl IRacingFeed {
    /// Feed over the real simulator mapping. Never connects off Windows.
    pub fn new() -> Self {
        Self::with_opener(platform_opener())
    }

    pub fn with_opener(opener: Box<dyn MemoryOpener>) -> Self {
        Self {
            opener,
            view: None,
            connected: false,
            probe_interval: PROBE_INTERVAL,
            next_probe: None,
            reader: FrameReader::default(),
        }
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    /// Try to map the simulator if a probe is due. Sleeps out the timeout
    /// otherwise.
    fn probe(&mut self, timeout: Duration) -> bool {
        let now = Instant::now();
        if let Some(due) = self.next_probe
            && now < due
        {
            std::thread::sleep(timeout.min(due.saturating_duration_since(now)));
            return false;
        }
        self.next_probe = Some(now + self.probe_interval);

        match self.opener.open() {
            Some(view) => {
                trace!(size = view.size(), "IRSDK memory map opened");
                self.view = Some(view);
                true
            }
            None => {
                std::thread::sleep(timeout.min(self.probe_interval));
                false
            }
        }
    }

    fn lose_view(&mut self) -> FeedPoll<'_> {
        self.view = None;
        self.reader.reset();
        if std::mem::take(&mut self.connected) {
            info!("iRacing stopped publishing telemetry");
            FeedPoll::Disconnected
        } else {
            FeedPoll::Idle
        }
    }
}

impl SimulatorFeed for IRacingFeed {
    fn name(&self) -> &str {
        "iracing"
    }

    fn open(&mut self) {
        self.view = None;
        self.connected = false;
        self.next_probe = None;
        self.reader.reset();
    }

    fn poll(&mut self, timeout: Duration) -> FeedPoll<'_> {
        if self.view.is_none() && !self.probe(timeout) {
            return FeedPoll::Idle;
        }
        let Some(view) = self.view.as_deref() else {
            return FeedPoll::Idle;
        };

        let header = match IrsdkHeader::read(view) {
            Ok(header) => header,
            Err(err) => {
                debug!(error = %err, "IRSDK header unreadable");
                return self.lose_view();
            }
        };
        if !header.is_connected() {
            return self.lose_view();
        }
        if !self.connected {
            self.connected = true;
            self.reader.reset();
            info!(tick_rate = header.tick_rate, "iRacing is publishing telemetry");
            return FeedPoll::Connected;
        }

        view.wait_for_data(timeout.min(header.tick_interval()));
        match self.reader.read(view) {
            Ok(true) => FeedPoll::Frame(&self.reader.frame),
            Ok(false) => FeedPoll::Idle,
            Err(err) => {
                debug!(error = %err, "IRSDK frame skipped");
                FeedPoll::Idle
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.view = None;
        self.connected = false;
        self.reader.reset();
    }
}

impl std::fmt::Debug for IRacingFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IRacingFeed")
            .field("mapped", &self.view.is_some())
            .field("connected", &self.connected)
            .field("probe_interval", &self.probe_interval)
            .finish_non_exhaustive()
    }
}
