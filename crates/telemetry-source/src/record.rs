//! Named-field access to one raw simulator telemetry frame.

use std::collections::HashMap;

use omg_telemetry_core::{Corner, TelemetrySnapshot, TreadPoint};
use thiserror::Error;

/// A single field read that could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("telemetry variable '{name}' is not present")]
    Missing { name: String },

    #[error("telemetry variable '{name}' has non-numeric type {var_type}")]
    Unsupported { name: String, var_type: &'static str },

    #[error("telemetry variable '{name}' lies outside the data row")]
    OutOfBounds { name: String },
}

impl FieldError {
    pub fn missing(name: &str) -> Self {
        Self::Missing {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Missing { name } | Self::Unsupported { name, .. } | Self::OutOfBounds { name } => {
                name
            }
        }
    }
}

/// Session metadata published alongside telemetry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionInfo {
    /// Player car redline, RPM.
    pub red_line_rpm: Option<f32>,
    /// Number of entries in the driver roster.
    pub roster_size: Option<usize>,
}

/// One raw telemetry frame with fallible typed reads by variable name.
///
/// Numeric reads convert between the simulator's numeric types the same way
/// the IRSDK does: a float read of an int variable succeeds, a boolean read of
/// an int variable is `value != 0`.
pub trait TelemetryRecord {
    fn float(&self, name: &str) -> Result<f32, FieldError>;
    fn int(&self, name: &str) -> Result<i32, FieldError>;
    fn boolean(&self, name: &str) -> Result<bool, FieldError>;
    /// Parsed session metadata, if the simulator has published any.
    fn session(&self) -> Option<&SessionInfo>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Text(String),
}

/// In-memory [`TelemetryRecord`] used by the synthetic and scripted feeds.
#[derive(Debug, Clone, Default)]
pub struct RecordMap {
    fields: HashMap<String, FieldValue>,
    session: Option<SessionInfo>,
}

impl RecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A complete frame that acquires back into `snapshot`.
    ///
    /// Fuel use is expressed as an hourly rate over a 90 s last lap, so the
    /// rebuilt fuel-per-lap matches up to float rounding.
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        const LAST_LAP_S: f32 = 90.0;

        let mut record = Self::new()
            .with_float("RPM", snapshot.rpm)
            .with_float("Speed", snapshot.speed_ms)
            .with_int("Gear", i32::from(snapshot.gear))
            .with_float("Throttle", snapshot.throttle)
            .with_float("Brake", snapshot.brake)
            .with_float("Clutch", snapshot.clutch)
            .with_float("FuelLevel", snapshot.fuel_level)
            .with_float("FuelUsePerHour", snapshot.fuel_per_lap * 3600.0 / LAST_LAP_S)
            .with_float("LapLastLapTime", LAST_LAP_S)
            .with_float("LapCurrentLapTime", snapshot.lap_time)
            .with_float("LapBestLapTime", snapshot.best_lap_time)
            .with_float("LapDeltaToBestLap", snapshot.delta_to_best)
            .with_int("Lap", i32::from(snapshot.lap))
            .with_int("PlayerCarPosition", i32::from(snapshot.position))
            .with_float("SessionTimeRemain", snapshot.session_time_remaining)
            .with_bool("IsOnTrack", snapshot.flags.on_track)
            .with_bool("OnPitRoad", snapshot.flags.in_pit)
            .with_int("SessionState", if snapshot.flags.session_active { 4 } else { 0 })
            .with_session(SessionInfo {
                red_line_rpm: Some(snapshot.max_rpm),
                roster_size: usize::try_from(snapshot.total_cars).ok(),
            });

        for corner in Corner::ALL {
            for point in TreadPoint::ALL {
                record.set(
                    &format!("{}temp{}", corner.prefix(), point.suffix()),
                    FieldValue::Float(snapshot.tires.temperature(corner, point)),
                );
            }
            record.set(
                &format!("{}pressure", corner.prefix()),
                FieldValue::Float(snapshot.tires.pressure(corner)),
            );
        }
        record
    }

    pub fn with_float(mut self, name: &str, value: f32) -> Self {
        self.set(name, FieldValue::Float(value));
        self
    }

    pub fn with_int(mut self, name: &str, value: i32) -> Self {
        self.set(name, FieldValue::Int(value));
        self
    }

    pub fn with_bool(mut self, name: &str, value: bool) -> Self {
        self.set(name, FieldValue::Bool(value));
        self
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn set_session(&mut self, session: Option<SessionInfo>) {
        self.session = session;
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        let mut fields: Vec<_> = self
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        fields.sort_unstable_by_key(|(name, _)| *name);
        fields.into_iter()
    }

    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    fn get(&self, name: &str) -> Result<&FieldValue, FieldError> {
        self.fields.get(name).ok_or_else(|| FieldError::missing(name))
    }
}

fn unsupported(name: &str) -> FieldError {
    FieldError::Unsupported {
        name: name.to_string(),
        var_type: "char",
    }
}

impl TelemetryRecord for RecordMap {
    fn float(&self, name: &str) -> Result<f32, FieldError> {
        match self.get(name)? {
            FieldValue::Float(v) => Ok(*v),
            #[expect(clippy::cast_precision_loss, reason = "simulator ints are small counters")]
            FieldValue::Int(v) => Ok(*v as f32),
            FieldValue::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            FieldValue::Text(_) => Err(unsupported(name)),
        }
    }

    fn int(&self, name: &str) -> Result<i32, FieldError> {
        match self.get(name)? {
            FieldValue::Int(v) => Ok(*v),
            #[expect(clippy::cast_possible_truncation, reason = "saturating float to int")]
            FieldValue::Float(v) => Ok(*v as i32),
            FieldValue::Bool(v) => Ok(i32::from(*v)),
            FieldValue::Text(_) => Err(unsupported(name)),
        }
    }

    fn boolean(&self, name: &str) -> Result<bool, FieldError> {
        match self.get(name)? {
            FieldValue::Bool(v) => Ok(*v),
            FieldValue::Int(v) => Ok(*v != 0),
            FieldValue::Float(v) => Ok(v.abs() > f32::EPSILON),
            FieldValue::Text(_) => Err(unsupported(name)),
        }
    }

    fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn typed_reads_convert_like_irsdk() -> TestResult {
        let record = RecordMap::new()
            .with_int("Gear", 4)
            .with_bool("IsOnTrack", true)
            .with_float("RPM", 6500.5);

        assert!((record.float("Gear")? - 4.0).abs() < f32::EPSILON);
        assert_eq!(record.int("IsOnTrack")?, 1);
        assert_eq!(record.int("RPM")?, 6500);
        assert!(record.boolean("Gear")?);
        Ok(())
    }

    #[test]
    fn missing_and_text_fields_are_errors() {
        let mut record = RecordMap::new();
        record.set("CarPath", FieldValue::Text("mx5".into()));

        assert_eq!(record.float("RPM"), Err(FieldError::missing("RPM")));
        let err = record.int("CarPath");
        assert!(matches!(err, Err(FieldError::Unsupported { .. })));
        assert_eq!(err.err().map(|e| e.name().to_string()), Some("CarPath".into()));
    }
}
