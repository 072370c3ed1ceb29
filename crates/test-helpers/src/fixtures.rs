//! Known telemetry snapshots.

use omg_telemetry_core::{SnapshotFlags, TelemetrySnapshot, TireReadings};

/// Mid-race snapshot whose encoding is pinned byte-for-byte in the packet tests.
///
/// 5000/8000 RPM, stationary in 3rd, full throttle, 50 L of fuel at 2.5 L/lap,
/// P1 of 20 on lap 5 with 600 s remaining, tires at 80 °C / 180 kPa, on track
/// in an active session.
pub fn reference_snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        rpm: 5000.0,
        max_rpm: 8000.0,
        speed_ms: 0.0,
        gear: 3,
        throttle: 1.0,
        brake: 0.0,
        clutch: 0.0,
        fuel_level: 50.0,
        fuel_per_lap: 2.5,
        lap_time: 90.0,
        best_lap_time: 88.0,
        delta_to_best: 2.0,
        lap: 5,
        position: 1,
        total_cars: 20,
        session_time_remaining: 600.0,
        tires: TireReadings::uniform(80.0, 180.0),
        flags: SnapshotFlags {
            on_track: true,
            in_pit: false,
            session_active: true,
        },
    }
}

/// Car sitting in its pit box, engine idling.
pub fn in_pit_snapshot() -> TelemetrySnapshot {
    TelemetrySnapshot {
        rpm: 900.0,
        gear: 0,
        lap: 1,
        position: 7,
        total_cars: 20,
        flags: SnapshotFlags {
            on_track: true,
            in_pit: true,
            session_active: true,
        },
        ..reference_snapshot()
    }
}
