/// Configuration management for the chat server.
/// Handles command-line argument parsing and config structure.
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::retention::{DEFAULT_RETENTION_HOURS, DEFAULT_SWEEP_INTERVAL_SECS, MAX_RETENTION_HOURS};

#[derive(Parser, Debug)]
#[command(name = "Codename Chat Server")]
#[command(about = "Membership-gated chat server with expiring messages", long_about = None)]
pub struct Config {
    /// Server port (default: 4000)
    #[arg(long, default_value = "4000")]
    pub port: u16,

    /// SQLite database file path (default: chatserver.db)
    #[arg(long, default_value = "chatserver.db")]
    pub database: PathBuf,

    /// PID file path (optional) - write server PID to this file on startup
    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    /// Hours a message is kept before the sweeper deletes it (1 to 87600)
    #[arg(
        long,
        default_value_t = DEFAULT_RETENTION_HOURS,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RETENTION_HOURS))
    )]
    pub retention_hours: u32,

    /// Seconds between retention sweeps (at least 1)
    #[arg(
        long,
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Parse command-line arguments into Config
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.retention_hours))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
