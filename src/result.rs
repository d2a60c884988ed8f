//! Result values returned by the command runner and the supervisor.
use std::fmt;

use serde::Serialize;

/// Message reported when `start` finds the server already up.
pub const ALREADY_RUNNING: &str = "server is already running";
/// Message reported when `stop` finds the server down.
pub const NOT_RUNNING: &str = "server is not running";
/// Message reported when the start poll budget is exhausted.
pub const DID_NOT_START: &str = "server did not start";
/// Message reported when the stop poll budget is exhausted.
pub const DID_NOT_STOP: &str = "server did not stop";
/// Message reported when a start poll is cancelled by the caller.
pub const START_CANCELLED: &str = "start cancelled";
/// Message reported when a stop poll is cancelled by the caller.
pub const STOP_CANCELLED: &str = "stop cancelled";

/// Outcome of a one-shot external command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Program followed by its arguments, as executed.
    pub argv: Vec<String>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Exit status of the process.
    pub exit: i32,
}

impl CommandResult {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit == 0
    }

    /// The argument vector joined for display.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Outcome of a start/stop/status orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorResult {
    /// Whether the orchestration reached its goal.
    pub success: bool,
    /// Optional explanation, always present for negative outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SupervisorResult {
    /// A successful outcome with no message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A successful outcome carrying a message.
    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// An unsuccessful outcome.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for SupervisorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.success) {
            (Some(message), _) => write!(f, "{message}"),
            (None, true) => write!(f, "ok"),
            (None, false) => write!(f, "failed"),
        }
    }
}
