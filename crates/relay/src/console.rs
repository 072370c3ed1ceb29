//! Line-oriented control commands read by the `omg-relay run` console.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::config::{BroadcastPort, RelayConfig, UpdateRate};
use crate::error::RelayError;
use crate::service::RelayService;

pub const HELP: &str = "\
commands:
  start        begin relaying
  stop         stop relaying
  toggle       start if stopped, stop if running
  status       show relay state, target and rate
  port <n>     change the broadcast port (1024-65535)
  rate <hz>    change the update rate (10-60)
  quit         stop and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Stop,
    Toggle,
    Status,
    Port(u32),
    Rate(u32),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs a value")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a number")]
    InvalidNumber(String),
}

fn number(command: &'static str, arg: Option<&str>) -> Result<u32, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(command))?;
    match arg.parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(CommandError::InvalidNumber(arg.to_string())),
    }
}

/// Parse one console line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "toggle" => ConsoleCommand::Toggle,
        "status" => ConsoleCommand::Status,
        "port" => ConsoleCommand::Port(number("port", words.next())?),
        "rate" => ConsoleCommand::Rate(number("rate", words.next())?),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        _ => return Err(CommandError::Unknown(verb.to_string())),
    };
    Ok(Some(command))
}

/// Result of running a console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// The command changed a persisted setting.
    ConfigChanged(String),
    Quit,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) | Reply::ConfigChanged(text) => f.write_str(text),
            Reply::Quit => f.write_str("bye"),
        }
    }
}

fn status_line(service: &RelayService) -> String {
    let target = match service.relay().unicast_address() {
        Some(address) => format!("{address}:{}", service.port()),
        None => service.relay().broadcaster().target().to_string(),
    };
    let stats = service.relay().broadcaster().stats();
    format!(
        "{} | target {target} | {} | sent {} dropped {}",
        service.connection_state(),
        service.rate(),
        stats.sent(),
        stats.dropped(),
    )
}

/// Apply `command` to the running service, mirroring setting changes into
/// `config`.
pub async fn execute(
    service: &RelayService,
    config: &mut RelayConfig,
    command: ConsoleCommand,
) -> Result<Reply, RelayError> {
    let command = match command {
        ConsoleCommand::Toggle if service.is_running() => ConsoleCommand::Stop,
        ConsoleCommand::Toggle => ConsoleCommand::Start,
        other => other,
    };
    let reply = match command {
        ConsoleCommand::Start | ConsoleCommand::Toggle => {
            if service.start().await {
                Reply::Text("relay started".to_string())
            } else if service.is_running() {
                Reply::Text("relay is already running".to_string())
            } else {
                Reply::Text("relay failed to start; see log".to_string())
            }
        }
        ConsoleCommand::Stop => {
            if service.stop().await {
                Reply::Text("relay stopped".to_string())
            } else {
                Reply::Text("relay is not running".to_string())
            }
        }
        ConsoleCommand::Status => Reply::Text(status_line(service)),
        ConsoleCommand::Port(port) => {
            service.update_broadcast_port(port)?;
            config.broadcast_port = BroadcastPort::new(port)?;
            Reply::ConfigChanged(format!("broadcast port set to {port}"))
        }
        ConsoleCommand::Rate(hz) => {
            service.update_rate(hz)?;
            config.update_rate = service.rate();
            Reply::ConfigChanged(format!("update rate set to {}", service.rate()))
        }
        ConsoleCommand::Help => Reply::Text(HELP.to_string()),
        ConsoleCommand::Quit => Reply::Quit,
    };
    Ok(reply)
}

/// Persist the one setting `command` changed.
///
/// The file on disk is reloaded and only that field is replaced, so one-off
/// overrides held by the running process are not written back.
pub fn save_setting(path: &Path, command: ConsoleCommand) -> Result<(), RelayError> {
    let mut saved = RelayConfig::load_from(path);
    match command {
        ConsoleCommand::Port(port) => saved.broadcast_port = BroadcastPort::new(port)?,
        ConsoleCommand::Rate(hz) => saved.update_rate = UpdateRate::new(hz)?,
        _ => return Ok(()),
    }
    saved.try_save_to(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parses_verbs_case_insensitively() -> TestResult {
        assert_eq!(parse_command("START")?, Some(ConsoleCommand::Start));
        assert_eq!(parse_command("  toggle ")?, Some(ConsoleCommand::Toggle));
        assert_eq!(parse_command("exit")?, Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("port 30000")?, Some(ConsoleCommand::Port(30000)));
        assert_eq!(parse_command("rate 30")?, Some(ConsoleCommand::Rate(30)));
        Ok(())
    }

    #[test]
    fn blank_line_is_nothing() -> TestResult {
        assert_eq!(parse_command("")?, None);
        assert_eq!(parse_command("   \t")?, None);
        Ok(())
    }

    #[test]
    fn reports_bad_input() {
        assert_eq!(
            parse_command("launch"),
            Err(CommandError::Unknown("launch".to_string()))
        );
        assert_eq!(parse_command("rate"), Err(CommandError::MissingArgument("rate")));
        assert_eq!(
            parse_command("port -1"),
            Err(CommandError::InvalidNumber("-1".to_string()))
        );
    }

    #[test]
    fn range_checks_happen_at_execution() -> TestResult {
        // 70 parses; the service rejects it.
        assert_eq!(parse_command("rate 70")?, Some(ConsoleCommand::Rate(70)));
        Ok(())
    }

    #[test]
    fn saving_a_setting_keeps_other_fields_from_disk() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        let on_disk = RelayConfig {
            update_rate: UpdateRate::new(30)?,
            auto_start: false,
            ..RelayConfig::default()
        };
        on_disk.try_save_to(&path)?;

        save_setting(&path, ConsoleCommand::Port(30500))?;

        let saved = RelayConfig::try_load_from(&path)?;
        assert_eq!(
            saved,
            RelayConfig {
                broadcast_port: BroadcastPort::new(30500)?,
                ..on_disk
            }
        );
        Ok(())
    }

    #[test]
    fn saving_a_rate_leaves_port_and_target_alone() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");

        RelayConfig::default().try_save_to(&path)?;

        save_setting(&path, ConsoleCommand::Rate(20))?;

        let saved = RelayConfig::try_load_from(&path)?;
        assert_eq!(saved.update_rate.hz(), 20);
        assert_eq!(saved.broadcast_port, BroadcastPort::DEFAULT);
        assert_eq!(saved.unicast_address, None);
        Ok(())
    }

    #[test]
    fn saving_other_commands_writes_nothing() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("settings.json");
        save_setting(&path, ConsoleCommand::Status)?;
        assert!(!path.exists());
        Ok(())
    }
}
