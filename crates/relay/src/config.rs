//! Persisted relay settings.
//!
//! Stored as pretty-printed JSON with PascalCase keys:
//!
//! ```json
//! {
//!   "BroadcastPort": 20777,
//!   "UpdateRate": 60,
//!   "AutoStart": true,
//!   "StartWithWindows": false
//! }
//! ```
//!
//! Loading never fails: a missing or corrupt file yields defaults, and a
//! field that is out of range or of the wrong type is reset on its own.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::RelayError;

const APP_DIR: &str = "OneMoreGaugeRelay";
const FILE_NAME: &str = "settings.json";

/// Relay tick rate in Hz, 10..=60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UpdateRate(u32);

impl UpdateRate {
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 60;
    pub const DEFAULT: Self = Self(60);

    pub fn new(hz: u32) -> Result<Self, RelayError> {
        if (Self::MIN..=Self::MAX).contains(&hz) {
            Ok(Self(hz))
        } else {
            Err(RelayError::InvalidRate(hz))
        }
    }

    pub fn hz(self) -> u32 {
        self.0
    }

    /// Time between ticks, truncated to whole nanoseconds.
    pub fn interval(self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.0))
    }
}

impl Default for UpdateRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for UpdateRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.0)
    }
}

/// UDP destination port, 1024..=65535.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BroadcastPort(u16);

impl BroadcastPort {
    pub const MIN: u16 = 1024;
    pub const DEFAULT: Self = Self(20777);

    pub fn new(port: u32) -> Result<Self, RelayError> {
        match u16::try_from(port) {
            Ok(port) if port >= Self::MIN => Ok(Self(port)),
            _ => Err(RelayError::InvalidPort(port)),
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl Default for BroadcastPort {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BroadcastPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings as found on disk, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawConfig {
    broadcast_port: Option<Value>,
    update_rate: Option<Value>,
    auto_start: Option<Value>,
    start_with_windows: Option<Value>,
    unicast_address: Option<Value>,
}

fn number_field<T>(
    raw: Option<Value>,
    key: &str,
    parse: impl FnOnce(u32) -> Result<T, RelayError>,
    default: T,
) -> T {
    let Some(value) = raw else {
        return default;
    };
    let parsed = value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| format!("not a positive integer: {value}"))
        .and_then(|n| parse(n).map_err(|err| err.to_string()));
    parsed.unwrap_or_else(|reason| {
        warn!(key, %reason, "settings value out of range; using default");
        default
    })
}

fn bool_field(raw: Option<Value>, key: &str, default: bool) -> bool {
    match raw {
        None => default,
        Some(Value::Bool(value)) => value,
        Some(other) => {
            warn!(key, value = %other, "settings value is not a boolean; using default");
            default
        }
    }
}

fn unicast_field(raw: Option<Value>) -> Option<String> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(address)) => normalize_address(Some(address)),
        Some(other) => {
            warn!(value = %other, "UnicastAddress is not a string; broadcasting instead");
            None
        }
    }
}

/// Trim a unicast address; blank means broadcast.
pub fn normalize_address(address: Option<String>) -> Option<String> {
    address
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
}

impl From<RawConfig> for RelayConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            broadcast_port: number_field(
                raw.broadcast_port,
                "BroadcastPort",
                BroadcastPort::new,
                defaults.broadcast_port,
            ),
            update_rate: number_field(
                raw.update_rate,
                "UpdateRate",
                UpdateRate::new,
                defaults.update_rate,
            ),
            auto_start: bool_field(raw.auto_start, "AutoStart", defaults.auto_start),
            start_with_windows: bool_field(
                raw.start_with_windows,
                "StartWithWindows",
                defaults.start_with_windows,
            ),
            unicast_address: unicast_field(raw.unicast_address),
        }
    }
}

/// User-facing relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "RawConfig")]
pub struct RelayConfig {
    pub broadcast_port: BroadcastPort,
    pub update_rate: UpdateRate,
    /// Start relaying as soon as the application launches.
    pub auto_start: bool,
    /// Launch with the OS session. Stored only; registration lives elsewhere.
    pub start_with_windows: bool,
    /// Send to this host instead of the broadcast address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unicast_address: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broadcast_port: BroadcastPort::DEFAULT,
            update_rate: UpdateRate::DEFAULT,
            auto_start: true,
            start_with_windows: false,
            unicast_address: None,
        }
    }
}

impl RelayConfig {
    /// `<config dir>/OneMoreGaugeRelay/settings.json`.
    pub fn default_path() -> Result<PathBuf, RelayError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
            .ok_or(RelayError::NoConfigDir)
    }

    /// Load settings, falling back to defaults on any failure.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load_from(path) {
            Ok(config) => {
                info!(path = %path.display(), "settings loaded");
                config
            }
            Err(RelayError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no settings file; using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(error = %err, "settings unreadable; using defaults");
                Self::default()
            }
        }
    }

    pub fn try_load_from(path: &Path) -> Result<Self, RelayError> {
        let content = std::fs::read_to_string(path).map_err(|source| RelayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| RelayError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save settings; failures are logged and otherwise ignored.
    pub fn save_to(&self, path: &Path) {
        if let Err(err) = self.try_save_to(path) {
            warn!(error = %err, "failed to save settings");
        }
    }

    pub fn try_save_to(&self, path: &Path) -> Result<(), RelayError> {
        let io_error = |source| RelayError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| RelayError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_error)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn rate_bounds() {
        assert!(UpdateRate::new(9).is_err());
        assert!(UpdateRate::new(61).is_err());
        assert_eq!(UpdateRate::new(10).map(UpdateRate::hz).ok(), Some(10));
        assert_eq!(UpdateRate::new(60).map(UpdateRate::hz).ok(), Some(60));
    }

    #[test]
    fn interval_is_truncated_nanoseconds() -> TestResult {
        assert_eq!(UpdateRate::new(60)?.interval(), Duration::from_nanos(16_666_666));
        assert_eq!(UpdateRate::new(30)?.interval(), Duration::from_nanos(33_333_333));
        assert_eq!(UpdateRate::new(10)?.interval(), Duration::from_millis(100));
        Ok(())
    }

    #[test]
    fn port_bounds() {
        assert!(matches!(BroadcastPort::new(1023), Err(RelayError::InvalidPort(1023))));
        assert!(matches!(BroadcastPort::new(65536), Err(RelayError::InvalidPort(65536))));
        assert_eq!(BroadcastPort::new(1024).map(BroadcastPort::get).ok(), Some(1024));
        assert_eq!(BroadcastPort::new(65535).map(BroadcastPort::get).ok(), Some(65535));
    }

    #[test]
    fn serializes_with_original_key_names() -> TestResult {
        let json = serde_json::to_value(RelayConfig::default())?;
        assert_eq!(
            json,
            serde_json::json!({
                "BroadcastPort": 20777,
                "UpdateRate": 60,
                "AutoStart": true,
                "StartWithWindows": false,
            })
        );
        Ok(())
    }

    #[test]
    fn out_of_range_fields_reset_individually() -> TestResult {
        let config: RelayConfig = serde_json::from_str(
            r#"{"BroadcastPort": 80, "UpdateRate": 30, "AutoStart": "yes", "StartWithWindows": true}"#,
        )?;
        assert_eq!(config.broadcast_port, BroadcastPort::DEFAULT);
        assert_eq!(config.update_rate.hz(), 30);
        assert!(config.auto_start);
        assert!(config.start_with_windows);
        Ok(())
    }

    #[test]
    fn missing_keys_take_defaults() -> TestResult {
        let config: RelayConfig = serde_json::from_str(r#"{"UpdateRate": 20}"#)?;
        assert_eq!(
            config,
            RelayConfig {
                update_rate: UpdateRate::new(20)?,
                ..RelayConfig::default()
            }
        );
        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn fallbacks_are_logged() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, r#"{"UpdateRate": 500}"#)?;

        let config = RelayConfig::load_from(&path);
        assert_eq!(config.update_rate, UpdateRate::DEFAULT);
        assert!(logs_contain("settings value out of range"));

        std::fs::write(&path, "not json")?;
        assert_eq!(RelayConfig::load_from(&path), RelayConfig::default());
        assert!(logs_contain("settings unreadable"));
        Ok(())
    }

    #[test]
    fn blank_unicast_address_means_broadcast() -> TestResult {
        let config: RelayConfig = serde_json::from_str(r#"{"UnicastAddress": "  "}"#)?;
        assert_eq!(config.unicast_address, None);
        let config: RelayConfig = serde_json::from_str(r#"{"UnicastAddress": " 10.0.0.7 "}"#)?;
        assert_eq!(config.unicast_address.as_deref(), Some("10.0.0.7"));
        Ok(())
    }
}
