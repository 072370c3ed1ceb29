//! Error types for the relay

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("update rate must be between 10 and 60 Hz, got {0}")]
    InvalidRate(u32),

    #[error("broadcast port must be between 1024 and 65535, got {0}")]
    InvalidPort(u32),

    #[error("no per-user configuration directory is available")]
    NoConfigDir,

    #[error("failed to bind UDP socket: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl RelayError {
    /// Whether the error is a rejected configuration value.
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Self::InvalidRate(_) | Self::InvalidPort(_))
    }
}
