//! Building a [`TelemetrySnapshot`] from one raw frame.
//!
//! A snapshot is all-or-nothing: if any required variable cannot be read the
//! whole frame is rejected. Max RPM, fuel-per-lap and car count have fixed
//! fallbacks instead.

use omg_telemetry_core::{
    Corner, SnapshotFlags, TelemetrySnapshot, TireReadings, TreadPoint, saturate_i8, saturate_i16,
};

use crate::record::{FieldError, TelemetryRecord};

/// Redline used when the session does not report one.
pub const DEFAULT_MAX_RPM: f32 = 8000.0;

/// Lap length assumed for fuel-per-lap before a lap has been completed.
pub const FALLBACK_REFERENCE_LAP_S: f32 = 90.0;

const SECONDS_PER_HOUR: f32 = 3600.0;

/// Carcass temperature variables, corner-major in wire order.
const TIRE_TEMP_VARS: [[&str; 3]; 4] = [
    ["LFtempCL", "LFtempCM", "LFtempCR"],
    ["RFtempCL", "RFtempCM", "RFtempCR"],
    ["LRtempCL", "LRtempCM", "LRtempCR"],
    ["RRtempCL", "RRtempCM", "RRtempCR"],
];

const TIRE_PRESSURE_VARS: [&str; 4] = ["LFpressure", "RFpressure", "LRpressure", "RRpressure"];

/// Build a snapshot from `record`, or report the first field that failed.
pub fn build_snapshot(record: &dyn TelemetryRecord) -> Result<TelemetrySnapshot, FieldError> {
    Ok(TelemetrySnapshot {
        rpm: record.float("RPM")?,
        max_rpm: max_rpm(record),
        speed_ms: record.float("Speed")?,
        gear: saturate_i8(record.int("Gear")?),
        throttle: record.float("Throttle")?,
        brake: record.float("Brake")?,
        clutch: record.float("Clutch")?,

        fuel_level: record.float("FuelLevel")?,
        fuel_per_lap: fuel_per_lap(record),

        lap_time: record.float("LapCurrentLapTime")?,
        best_lap_time: record.float("LapBestLapTime")?,
        delta_to_best: record.float("LapDeltaToBestLap")?,
        lap: saturate_i16(record.int("Lap")?),

        position: saturate_i8(record.int("PlayerCarPosition")?),
        total_cars: total_cars(record),

        session_time_remaining: record.float("SessionTimeRemain")?,

        tires: tire_readings(record)?,
        flags: SnapshotFlags {
            on_track: record.boolean("IsOnTrack")?,
            in_pit: record.boolean("OnPitRoad")?,
            session_active: record.int("SessionState")? > 0,
        },
    })
}

/// Session redline, else [`DEFAULT_MAX_RPM`].
pub fn max_rpm(record: &dyn TelemetryRecord) -> f32 {
    record
        .session()
        .and_then(|session| session.red_line_rpm)
        .unwrap_or(DEFAULT_MAX_RPM)
}

/// Estimated fuel burn per lap from the hourly rate.
///
/// Zero when the rate is not positive or cannot be read. Uses the last lap
/// time when positive, else [`FALLBACK_REFERENCE_LAP_S`].
pub fn fuel_per_lap(record: &dyn TelemetryRecord) -> f32 {
    let estimate = || -> Result<f32, FieldError> {
        let per_hour = record.float("FuelUsePerHour")?;
        if per_hour <= 0.0 {
            return Ok(0.0);
        }
        let last_lap = record.float("LapLastLapTime")?;
        let reference_lap = if last_lap > 0.0 {
            last_lap
        } else {
            FALLBACK_REFERENCE_LAP_S
        };
        Ok(per_hour / SECONDS_PER_HOUR * reference_lap)
    };
    estimate().unwrap_or(0.0)
}

/// Roster size saturated to `i8`, or 0 without session data.
pub fn total_cars(record: &dyn TelemetryRecord) -> i8 {
    record
        .session()
        .and_then(|session| session.roster_size)
        .map(|count| saturate_i8(i32::try_from(count).unwrap_or(i32::MAX)))
        .unwrap_or(0)
}

fn tire_readings(record: &dyn TelemetryRecord) -> Result<TireReadings, FieldError> {
    let mut tires = TireReadings::default();
    for (corner, (temp_vars, pressure_var)) in Corner::ALL
        .into_iter()
        .zip(TIRE_TEMP_VARS.iter().zip(TIRE_PRESSURE_VARS))
    {
        for (point, var) in TreadPoint::ALL.into_iter().zip(temp_vars) {
            tires.set_temperature(corner, point, record.float(var)?);
        }
        tires.set_pressure(corner, record.float(pressure_var)?);
    }
    Ok(tires)
}
