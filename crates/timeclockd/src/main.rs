//! timeclockd - attendance time clock service
//!
//! Console driver for the timeclock core. It wires together:
//! - Configuration loading
//! - Logging (stderr plus an optional log file)
//! - Event store initialization
//! - The session registry and coordinator
//! - A stdin command loop with periodic idle-session eviction

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::{Command, execute};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use timeclock_config::{Policy, load_config_or_default};
use timeclock_core::{AttendanceMachine, Coordinator, SessionRegistry};
use timeclock_store::{EventLog, EventStore, SqliteStore};
use timeclock_util::{
    Clock, DATABASE_FILENAME, SystemClock, default_config_path, is_mock_time_active,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// timeclockd - Attendance time clock service
#[derive(Parser, Debug)]
#[command(name = "timeclockd")]
#[command(about = "Attendance time clock service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/timeclock/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set TIMECLOCK_DATA_DIR env var)
    #[arg(short, long, env = "TIMECLOCK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (overrides the config file; RUST_LOG wins over both)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Keep the event log in memory only
    #[arg(long)]
    in_memory: bool,
}

/// Main service state
struct Service {
    coordinator: Coordinator,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn EventStore>,
    policy: Policy,
}

impl Service {
    fn new(args: &Args, policy: Policy) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        if is_mock_time_active() {
            warn!("Mock time is active, timestamps are not real");
        }

        let store: Arc<dyn EventStore> = if args.in_memory {
            info!("Using in-memory event log");
            Arc::new(
                SqliteStore::in_memory(clock.clone())
                    .context("Failed to open in-memory database")?,
            )
        } else {
            let data_dir = args
                .data_dir
                .clone()
                .unwrap_or_else(|| policy.service.data_dir.clone());

            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

            let db_path = data_dir.join(DATABASE_FILENAME);
            let store = SqliteStore::open(&db_path, clock.clone())
                .with_context(|| format!("Failed to open database {:?}", db_path))?;
            info!(db_path = %db_path.display(), "Store initialized");
            Arc::new(store)
        };

        let registry = Arc::new(SessionRegistry::new());
        let coordinator = Coordinator::new(
            AttendanceMachine::new(EventLog::new(store.clone())),
            registry.clone(),
            clock,
            policy.session,
        );

        Ok(Self {
            coordinator,
            registry,
            store,
            policy,
        })
    }

    async fn run(self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let mut eviction_timer = tokio::time::interval(self.policy.session.eviction_interval);
        eviction_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Service running, type 'help' for commands");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received interrupt, shutting down");
                    break;
                }

                _ = eviction_timer.tick() => {
                    let evicted = self.coordinator.evict_expired();
                    debug!(evicted, sessions = self.registry.len(), "Eviction sweep");
                    if !self.store.is_healthy() {
                        warn!("Event store is not healthy");
                    }
                }

                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!("Input closed, shutting down");
                            break;
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to read input");
                            break;
                        }
                    };

                    match Command::parse(&line) {
                        Ok(None) => {}
                        Ok(Some(command)) => {
                            println!("{}", execute(&self.coordinator, &command));
                            if command == Command::Quit {
                                break;
                            }
                        }
                        Err(e) => println!("{e}"),
                    }
                }
            }
        }

        info!("Shutting down timeclockd");

        let sessions = self.registry.snapshot();
        let open_panels = sessions.iter().filter(|s| s.panel_open).count();
        if open_panels > 0 {
            info!(open_panels, "Discarding open panels, their cycles stay open in the log");
        }
        self.registry.clear();

        info!("Shutdown complete");
        Ok(())
    }
}

/// Install the tracing subscriber: stderr always, plus the configured log
/// file when there is one
fn init_logging(args: &Args, policy: &Policy) -> Result<()> {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| policy.service.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let file_layer = match &policy.service.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let policy = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    init_logging(&args, &policy)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "timeclockd starting"
    );
    if config_exists {
        info!(config_path = %args.config.display(), "Configuration loaded");
    } else {
        info!(config_path = %args.config.display(), "No config file, using defaults");
    }

    let service = Service::new(&args, policy)?;
    service.run().await
}
