//! omg-relay - relay live iRacing telemetry to dashboards on the local network

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use omg_relay::{
    BroadcastPort, RelayConfig, RelayError, RelayService, Reply, UpdateRate, execute,
    normalize_address, parse_command, save_setting,
};
use omg_telemetry_source::{
    IRacingFeed, SimulatorFeed, SnapshotSource, SyntheticFeed, TelemetrySource,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "omg-relay")]
#[command(about = "Relay live racing telemetry to the local network as OMG1 UDP packets")]
#[command(version)]
struct Cli {
    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "OMG_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay and read control commands from stdin
    Run {
        /// Override the broadcast port for this run
        #[arg(long)]
        port: Option<u32>,

        /// Override the update rate in Hz for this run
        #[arg(long)]
        rate: Option<u32>,

        /// Send to this host instead of broadcasting
        #[arg(long)]
        unicast: Option<String>,

        /// Telemetry feed to relay
        #[arg(long, value_enum, default_value_t = FeedKind::Iracing)]
        feed: FeedKind,
    },

    /// Inspect or edit the settings file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file location
    Path,

    /// Print the effective settings
    Show,

    /// Change and save settings
    Set {
        #[arg(long)]
        port: Option<u32>,

        #[arg(long)]
        rate: Option<u32>,

        #[arg(long)]
        auto_start: Option<bool>,

        #[arg(long)]
        start_with_os: Option<bool>,

        /// Relay to a single host
        #[arg(long, conflicts_with = "broadcast")]
        unicast: Option<String>,

        /// Clear the unicast address and broadcast again
        #[arg(long)]
        broadcast: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FeedKind {
    /// iRacing shared memory
    Iracing,
    /// Generated lap data, for testing dashboards without the simulator
    Synthetic,
}

impl FeedKind {
    fn feed(self) -> Box<dyn SimulatorFeed> {
        match self {
            FeedKind::Iracing => Box::new(IRacingFeed::new()),
            FeedKind::Synthetic => Box::new(SyntheticFeed::new()),
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("omg_relay={log_level},omg_telemetry_source={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => RelayConfig::default_path().context("cannot locate the settings file"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_command(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            match err.downcast_ref::<RelayError>() {
                Some(relay_err) if relay_err.is_invalid_value() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run_command(cli: &Cli) -> Result<()> {
    let path = config_path(cli)?;
    match &cli.command {
        Commands::Run {
            port,
            rate,
            unicast,
            feed,
        } => {
            let mut config = RelayConfig::load_from(&path);
            if let Some(port) = port {
                config.broadcast_port = BroadcastPort::new(*port)?;
            }
            if let Some(rate) = rate {
                config.update_rate = UpdateRate::new(*rate)?;
            }
            if unicast.is_some() {
                config.unicast_address = normalize_address(unicast.clone());
            }
            run_relay(&path, config, *feed).await
        }
        Commands::Config(command) => config_command(&path, command),
    }
}

fn config_command(path: &Path, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Show => {
            let config = RelayConfig::load_from(path);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Set {
            port,
            rate,
            auto_start,
            start_with_os,
            unicast,
            broadcast,
        } => {
            let mut config = RelayConfig::load_from(path);
            if let Some(port) = port {
                config.broadcast_port = BroadcastPort::new(*port)?;
            }
            if let Some(rate) = rate {
                config.update_rate = UpdateRate::new(*rate)?;
            }
            if let Some(auto_start) = auto_start {
                config.auto_start = *auto_start;
            }
            if let Some(start_with_os) = start_with_os {
                config.start_with_windows = *start_with_os;
            }
            if *broadcast {
                config.unicast_address = None;
            } else if unicast.is_some() {
                config.unicast_address = normalize_address(unicast.clone());
            }
            config
                .try_save_to(path)
                .context("failed to save settings")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

async fn run_relay(path: &Path, mut config: RelayConfig, feed: FeedKind) -> Result<()> {
    let source: Arc<dyn SnapshotSource> = Arc::new(TelemetrySource::new(feed.feed()));
    let service = RelayService::from_config(&config, source)
        .context("failed to open the broadcast socket")?;
    info!(
        port = config.broadcast_port.get(),
        rate_hz = config.update_rate.hz(),
        feed = ?feed,
        "omg-relay ready; type 'help' for commands"
    );

    if config.auto_start {
        service.start().await;
    }

    let mut state = service.subscribe_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *state.borrow_and_update());
            }

            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Keep relaying when stdin is closed (e.g. run as a service).
                        stdin_open = false;
                        continue;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read console input");
                        stdin_open = false;
                        continue;
                    }
                };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                match execute(&service, &mut config, command).await {
                    Ok(Reply::Quit) => break,
                    Ok(reply @ Reply::ConfigChanged(_)) => {
                        if let Err(err) = save_setting(path, command) {
                            warn!(error = %err, "failed to save settings");
                        }
                        println!("{reply}");
                    }
                    Ok(reply) => println!("{reply}"),
                    Err(err) => println!("{err}"),
                }
            }
        }
    }

    service.stop().await;
    Ok(())
}
