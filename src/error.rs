//! Error handling for dbctl.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all failures that abort a control operation.
///
/// Expected negative outcomes such as "server is already running" are not errors;
/// they are reported through [`crate::result::SupervisorResult`]. Likewise a
/// command that ran and exited non-zero is reported through
/// [`crate::result::CommandResult`].
#[derive(Debug, Error)]
pub enum ControlError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[source] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// Configuration parsed but holds a value that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A precondition of the operation does not hold; nothing was launched.
    #[error("Precondition failed for {}: {reason}", path.display())]
    Precondition {
        /// The path the precondition concerns.
        path: PathBuf,
        /// Human-readable description of the violated condition.
        reason: String,
    },

    /// A required external executable could not be located.
    #[error("Could not find '{tool}' (searched: {})", display_paths(searched))]
    ToolNotFound {
        /// Logical name of the tool (e.g. `server`, `install_db`).
        tool: String,
        /// Locations that were examined.
        searched: Vec<PathBuf>,
    },

    /// The external process could not be launched at all.
    #[error("Failed to launch '{program}': {source}")]
    Execution {
        /// The program that failed to launch.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The external process was terminated by a signal.
    #[error("'{program}' was killed by signal {signal}")]
    KilledBySignal {
        /// The program that was killed.
        program: String,
        /// Signal number that terminated it.
        signal: i32,
    },

    /// Delivering a signal to the supervised process failed.
    #[error("Failed to signal process {pid}: {source}")]
    Signal {
        /// Target process id.
        pid: i32,
        /// Errno reported by `kill(2)`.
        #[source]
        source: nix::errno::Errno,
    },

    /// Another caller holds the advisory lock for this PID file.
    #[error("Another dbctl operation holds the lock at {}", path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// Filesystem error outside of process launching.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
