use std::fmt;

/// Relay connection indicator shown to the user.
///
/// `Disconnected` while the relay is stopped, `Waiting` while it runs without
/// telemetry, `Connected` while packets are flowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Waiting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// True for every state the relay can be in while running.
    pub fn is_running(&self) -> bool {
        matches!(self, ConnectionState::Waiting | ConnectionState::Connected)
    }

    /// Status line for the tray menu.
    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Stopped",
            ConnectionState::Waiting => "Waiting for iRacing...",
            ConnectionState::Connected => "Connected to iRacing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_text())
    }
}
