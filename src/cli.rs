//! Command-line interface for dbctl.
use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{config::DEFAULT_CONFIG, policy::BackoffKind};

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for dbctl.
#[derive(Parser)]
#[command(name = "dbctl", version, author)]
#[command(about = "Initialize, start, stop and inspect a local database server", long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG, global = true)]
    pub config: PathBuf,

    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Override the number of liveness checks.
    #[arg(long, value_name = "N", global = true)]
    pub attempts: Option<u32>,

    /// Override the delay between liveness checks (e.g. "500ms", "2s").
    #[arg(long, value_name = "DURATION", global = true)]
    pub interval: Option<String>,

    /// Override the backoff schedule: fixed or exponential.
    #[arg(long, value_name = "KIND", global = true)]
    pub backoff: Option<BackoffKind>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for dbctl.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Initialize an empty data directory.
    Init,

    /// Start the server and wait until it reports up.
    Start,

    /// Stop the server and wait until it exits.
    Stop,

    /// Stop the server if running, then start it.
    Restart,

    /// Show whether the server is running.
    Status {
        /// Emit machine-readable JSON output.
        #[arg(long)]
        json: bool,
    },

    /// Create a database through the admin tool.
    Createdb {
        /// Name of the database to create.
        name: String,
    },

    /// Show the tail of the server error log.
    Logs {
        /// Number of lines to show.
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
