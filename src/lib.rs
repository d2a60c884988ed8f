//! dbctl is a thin control layer around a local database server's command-line
//! tools. It initializes a data directory, starts the server as a detached
//! process and waits for its PID file, stops it with SIGTERM and a bounded wait,
//! and reports liveness.
//!
//! The crate targets unix hosts: it relies on `setsid`, POSIX signals and unix
//! permission bits.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Error handling.
pub mod error;

/// Server instance identity and launch flags.
pub mod handle;

/// Logs management.
pub mod logs;

/// Poll budgets, backoff and cancellation.
pub mod policy;

/// PID-file based liveness detection.
pub mod probe;

/// Result values for commands and orchestrations.
pub mod result;

/// External command execution.
pub mod runner;

/// Start/stop orchestration.
pub mod supervisor;

/// External tool resolution.
pub mod tools;
