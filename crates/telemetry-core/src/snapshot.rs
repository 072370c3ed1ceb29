//! The relayed telemetry value.

/// Wheel corner, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    LeftFront,
    RightFront,
    LeftRear,
    RightRear,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::LeftFront,
        Corner::RightFront,
        Corner::LeftRear,
        Corner::RightRear,
    ];

    /// Short prefix the simulator uses for per-corner variables (`LF`, `RF`, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            Corner::LeftFront => "LF",
            Corner::RightFront => "RF",
            Corner::LeftRear => "LR",
            Corner::RightRear => "RR",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Temperature probe position across the tread, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreadPoint {
    Left,
    Middle,
    Right,
}

impl TreadPoint {
    pub const ALL: [TreadPoint; 3] = [TreadPoint::Left, TreadPoint::Middle, TreadPoint::Right];

    /// Suffix of the simulator's carcass temperature variables (`CL`, `CM`, `CR`).
    pub fn suffix(self) -> &'static str {
        match self {
            TreadPoint::Left => "CL",
            TreadPoint::Middle => "CM",
            TreadPoint::Right => "CR",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Tire temperatures (°C) and pressures (kPa) for all four corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TireReadings {
    /// Indexed by [`Corner::index`] then [`TreadPoint::index`].
    pub temperatures: [[f32; 3]; 4],
    /// Indexed by [`Corner::index`].
    pub pressures: [f32; 4],
}

impl TireReadings {
    /// Every corner at the same temperature and pressure.
    pub fn uniform(temperature: f32, pressure: f32) -> Self {
        Self {
            temperatures: [[temperature; 3]; 4],
            pressures: [pressure; 4],
        }
    }

    pub fn temperature(&self, corner: Corner, point: TreadPoint) -> f32 {
        self.temperatures
            .get(corner.index())
            .and_then(|probes| probes.get(point.index()))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_temperature(&mut self, corner: Corner, point: TreadPoint, value: f32) {
        if let Some(slot) = self
            .temperatures
            .get_mut(corner.index())
            .and_then(|probes| probes.get_mut(point.index()))
        {
            *slot = value;
        }
    }

    pub fn pressure(&self, corner: Corner) -> f32 {
        self.pressures.get(corner.index()).copied().unwrap_or_default()
    }

    pub fn set_pressure(&mut self, corner: Corner, value: f32) {
        if let Some(slot) = self.pressures.get_mut(corner.index()) {
            *slot = value;
        }
    }

    /// Temperatures flattened corner-major (LF L/M/R, RF L/M/R, ...).
    pub fn temperatures_flat(&self) -> impl Iterator<Item = f32> + '_ {
        self.temperatures.iter().flat_map(|corner| corner.iter().copied())
    }
}

/// Car and session status bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotFlags {
    /// Car is on track (not in the garage or replay).
    pub on_track: bool,
    /// Car is on pit road.
    pub in_pit: bool,
    /// A session is running.
    pub session_active: bool,
}

impl SnapshotFlags {
    pub const ON_TRACK: u8 = 0x01;
    pub const IN_PIT: u8 = 0x02;
    pub const SESSION_ACTIVE: u8 = 0x04;

    /// Packed representation used on the wire.
    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.on_track {
            bits |= Self::ON_TRACK;
        }
        if self.in_pit {
            bits |= Self::IN_PIT;
        }
        if self.session_active {
            bits |= Self::SESSION_ACTIVE;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            on_track: bits & Self::ON_TRACK != 0,
            in_pit: bits & Self::IN_PIT != 0,
            session_active: bits & Self::SESSION_ACTIVE != 0,
        }
    }
}

/// One fully populated set of telemetry values captured at a single instant.
///
/// Snapshots are immutable once built. The acquisition side replaces the
/// cached snapshot wholesale, so a reader never observes a mix of two frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    pub rpm: f32,
    /// Redline RPM.
    pub max_rpm: f32,
    /// Speed in m/s.
    pub speed_ms: f32,
    /// -1 reverse, 0 neutral, 1.. forward gears.
    pub gear: i8,
    pub throttle: f32,
    pub brake: f32,
    pub clutch: f32,

    /// Fuel in the tank, liters.
    pub fuel_level: f32,
    /// Estimated fuel used per lap, liters.
    pub fuel_per_lap: f32,

    /// Current lap time, seconds.
    pub lap_time: f32,
    pub best_lap_time: f32,
    /// Delta to best lap, seconds. Negative is faster.
    pub delta_to_best: f32,
    pub lap: i16,

    pub position: i8,
    pub total_cars: i8,

    /// Session time remaining, seconds.
    pub session_time_remaining: f32,

    pub tires: TireReadings,
    pub flags: SnapshotFlags,
}

/// Saturate a raw simulator integer into the `i8` range.
pub fn saturate_i8(value: i32) -> i8 {
    i8::try_from(value).unwrap_or(if value < 0 { i8::MIN } else { i8::MAX })
}

/// Saturate a raw simulator integer into the `i16` range.
pub fn saturate_i16(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_match_wire_layout() {
        let flags = SnapshotFlags {
            on_track: true,
            in_pit: false,
            session_active: true,
        };
        assert_eq!(flags.bits(), 0x05);
        assert_eq!(SnapshotFlags::default().bits(), 0);
        assert_eq!(SnapshotFlags::from_bits(0x07).bits(), 0x07);
        assert!(SnapshotFlags::from_bits(0x02).in_pit);
    }

    #[test]
    fn corner_and_tread_order_is_wire_order() {
        let prefixes: Vec<_> = Corner::ALL.iter().map(|c| c.prefix()).collect();
        assert_eq!(prefixes, ["LF", "RF", "LR", "RR"]);
        let suffixes: Vec<_> = TreadPoint::ALL.iter().map(|t| t.suffix()).collect();
        assert_eq!(suffixes, ["CL", "CM", "CR"]);
        for (i, corner) in Corner::ALL.iter().enumerate() {
            assert_eq!(corner.index(), i);
        }
    }

    #[test]
    fn temperatures_flatten_corner_major() {
        let mut tires = TireReadings::default();
        tires.set_temperature(Corner::RightFront, TreadPoint::Right, 7.0);
        let flat: Vec<f32> = tires.temperatures_flat().collect();
        assert_eq!(flat.len(), 12);
        assert!(flat.get(5).is_some_and(|v| (*v - 7.0).abs() < f32::EPSILON));
        let value = tires.temperature(Corner::RightFront, TreadPoint::Right);
        assert!((value - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn saturation_clamps_to_range() {
        assert_eq!(saturate_i8(3), 3);
        assert_eq!(saturate_i8(-1), -1);
        assert_eq!(saturate_i8(200), i8::MAX);
        assert_eq!(saturate_i8(-500), i8::MIN);
        assert_eq!(saturate_i16(70_000), i16::MAX);
        assert_eq!(saturate_i16(-70_000), i16::MIN);
        assert_eq!(saturate_i16(12), 12);
    }
}
