//! Generated telemetry for demos and end-to-end checks without a simulator.

use std::time::{Duration, Instant};

use omg_telemetry_core::{Corner, SnapshotFlags, TelemetrySnapshot, TireReadings, TreadPoint};

use crate::feed::{FeedPoll, SimulatorFeed};
use crate::record::RecordMap;

const FRAME_RATE_HZ: u32 = 60;
const LAP_LENGTH_S: f32 = 92.0;
const FRAMES_PER_LAP: u64 = 92 * FRAME_RATE_HZ as u64;
const RED_LINE_RPM: f32 = 7500.0;
const IDLE_RPM: f32 = 2500.0;
const TOP_SPEED_MS: f32 = 68.0;
const START_FUEL_L: f32 = 40.0;
const FUEL_PER_LAP_L: f32 = 2.2;
const FIELD_SIZE: i8 = 18;
const SESSION_LENGTH_S: f32 = 1800.0;

/// A car lapping a fixed circuit at 60 Hz, deterministic per frame index.
#[derive(Debug)]
pub struct SyntheticFeed {
    frame_index: u64,
    next_frame_at: Option<Instant>,
    connected: bool,
    record: RecordMap,
}

impl Default for SyntheticFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticFeed {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            next_frame_at: None,
            connected: false,
            record: RecordMap::new(),
        }
    }

    fn frame_interval() -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(FRAME_RATE_HZ))
    }

    /// The snapshot this feed emits for frame `index`.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        reason = "synthetic values stay well inside f32/i16 range"
    )]
    pub fn snapshot_at(index: u64) -> TelemetrySnapshot {
        let t = index as f32 / FRAME_RATE_HZ as f32;
        let laps_done = index / FRAMES_PER_LAP;
        let lap_time = (index % FRAMES_PER_LAP) as f32 / FRAME_RATE_HZ as f32;
        let phase = lap_time / LAP_LENGTH_S * std::f32::consts::TAU;

        // Four straights and four braking zones per lap.
        let wave = (phase * 4.0).sin();
        let throttle = wave.max(0.0);
        let brake = (-wave - 0.6).max(0.0) / 0.4;
        let speed_ms = TOP_SPEED_MS * (0.55 + 0.45 * wave);
        let gear = (1.0 + speed_ms / TOP_SPEED_MS * 5.0).floor().clamp(1.0, 6.0);
        let gear_span = TOP_SPEED_MS / 6.0;
        let in_gear = (speed_ms - (gear - 1.0) * gear_span) / gear_span;
        let rpm = IDLE_RPM + (RED_LINE_RPM - IDLE_RPM) * in_gear.clamp(0.0, 1.0);

        let heat = 6.0 * (phase * 4.0).cos();
        let mut tires = TireReadings::uniform(85.0, 172.0);
        for corner in Corner::ALL {
            let side = if matches!(corner, Corner::LeftFront | Corner::LeftRear) {
                -1.0
            } else {
                1.0
            };
            for (point, offset) in TreadPoint::ALL.into_iter().zip([-2.0, 0.0, 2.0]) {
                tires.set_temperature(corner, point, 85.0 + heat * side + offset);
            }
            tires.set_pressure(corner, 172.0 + heat * 0.5);
        }

        TelemetrySnapshot {
            rpm,
            max_rpm: RED_LINE_RPM,
            speed_ms,
            gear: gear as i8,
            throttle,
            brake,
            clutch: 0.0,
            fuel_level: (START_FUEL_L - FUEL_PER_LAP_L * (t / LAP_LENGTH_S)).max(0.0),
            fuel_per_lap: if laps_done >= 1 { FUEL_PER_LAP_L } else { 0.0 },
            lap_time,
            best_lap_time: if laps_done >= 1 { LAP_LENGTH_S } else { 0.0 },
            delta_to_best: 0.4 * (phase * 2.0).sin(),
            lap: i16::try_from(laps_done.saturating_add(1)).unwrap_or(i16::MAX),
            position: 3,
            total_cars: FIELD_SIZE,
            session_time_remaining: (SESSION_LENGTH_S - t).max(0.0),
            tires,
            flags: SnapshotFlags {
                on_track: true,
                in_pit: false,
                session_active: true,
            },
        }
    }
}

impl SimulatorFeed for SyntheticFeed {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&mut self) {
        self.frame_index = 0;
        self.next_frame_at = None;
    }

    fn poll(&mut self, timeout: Duration) -> FeedPoll<'_> {
        if !self.connected {
            self.connected = true;
            return FeedPoll::Connected;
        }

        let now = Instant::now();
        let due = *self.next_frame_at.get_or_insert(now);
        if due > now {
            let wait = due.saturating_duration_since(now);
            if wait > timeout {
                std::thread::sleep(timeout);
                return FeedPoll::Idle;
            }
            std::thread::sleep(wait);
        }

        self.next_frame_at = Some(due + Self::frame_interval());
        let snapshot = Self::snapshot_at(self.frame_index);
        self.frame_index = self.frame_index.saturating_add(1);
        self.record = RecordMap::from_snapshot(&snapshot);
        FeedPoll::Frame(&self.record)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.connected = false;
    }
}
