//! Standalone host for permanent channels.
//!
//! Runs an in-process channel registry with the permanent-channel service
//! loaded, driven by operator commands on standard input. The background
//! timer flushes the snapshot whenever a permanent channel changed.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, then
//!    `PERMCHAN_CONFIG`, then `permchannels.yaml` (defaults if missing)
//! 2. Initialize structured logging (tracing)
//! 3. Start the host: register modes, create declared channels
//! 4. Loop over timer ticks, SIGHUP (rehash), Ctrl+C, and console lines
//! 5. On exit, unload the service and sweep empty channels

mod console;
mod error;
mod host;
mod signals;

use std::path::PathBuf;
use std::time::Duration;

use permchan_core::ChannelRegistry;
use permchan_core::config::LoggingConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::Command;
use crate::error::DaemonError;
use crate::host::Host;
use crate::signals::Hangup;

/// Environment variable naming the configuration file.
const CONFIG_PATH_ENV: &str = "PERMCHAN_CONFIG";

/// Configuration file used when none is named.
const DEFAULT_CONFIG_PATH: &str = "permchannels.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration file exists but cannot be loaded.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration.
    let config_path = config_path();
    let config_found = config_path.exists();
    let config = host::load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("permchan-daemon starting");
    if config_found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    // 3. Start the host.
    let mut host = Host::start(config_path, config);
    let mut ticker = flush_ticker(host.flush_interval_secs());
    let mut hangup = Hangup::install();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;
    info!(
        interval_secs = host.flush_interval_secs(),
        channels = host.registry().len(),
        "Ready"
    );

    // 4. Main loop.
    loop {
        tokio::select! {
            _ = ticker.tick() => host.tick(),
            () = hangup.recv() => {
                info!("SIGHUP received, rehashing");
                run_command(&mut host, &mut ticker, Command::Rehash);
            }
            () = signals::interrupt() => {
                info!("Interrupt received, shutting down");
                break;
            }
            line = lines.next_line(), if console_open => match line {
                Ok(Some(line)) => match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => run_command(&mut host, &mut ticker, command),
                    Err(console::ConsoleError::Empty) => {}
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    info!("Console closed; send SIGINT to stop");
                    console_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Console read failed, ignoring further input");
                    console_open = false;
                }
            },
        }
    }

    // 5. Unload.
    let removed = host.shutdown();
    info!(removed = removed.len(), "permchan-daemon stopped");
    Ok(())
}

/// Resolve the configuration path: first argument, then environment.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Timer for background flushes. The first tick fires one period from now.
fn flush_ticker(secs: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.reset();
    ticker
}

/// Run a command, print its reply, and pick up a changed flush interval.
fn run_command(host: &mut Host, ticker: &mut Interval, command: Command) {
    let rehash = command == Command::Rehash;
    match host.execute(command) {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
            warn!(error = %e, "Command failed");
            println!("error: {e}");
        }
    }
    if rehash && ticker.period().as_secs() != host.flush_interval_secs() {
        info!(interval_secs = host.flush_interval_secs(), "Flush interval changed");
        *ticker = flush_ticker(host.flush_interval_secs());
    }
}
