//! Configuration management for dbctl.
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use regex::Regex;
use serde::Deserialize;

use crate::{
    error::ControlError,
    handle::{ErrorSink, ProcessHandle, ServerFlags},
    policy::{Backoff, BackoffKind, PollPolicy},
};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "dbctl.yaml";

/// Represents the structure of the configuration file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server data directory.
    pub data_dir: PathBuf,
    /// PID file written by the server; defaults to `<data_dir>/server.pid`.
    pub pid_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub socket: Option<PathBuf>,
    /// Error log; when absent the server is started with syslog disabled.
    pub error_log: Option<PathBuf>,
    /// Destination for the spawned server's stdout/stderr.
    pub console_log: Option<PathBuf>,
    /// Account that owns the data directory after initialization.
    pub user: Option<String>,
    #[serde(default)]
    pub skip_grant_tables: bool,
    #[serde(default)]
    pub skip_networking: bool,
    /// Whether start/stop/init take an advisory lock next to the PID file.
    #[serde(default = "default_lock")]
    pub lock: bool,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub poll: PollConfig,
    /// Directory from which relative paths were resolved.
    #[serde(skip)]
    pub project_dir: Option<PathBuf>,
}

fn default_lock() -> bool {
    true
}

/// Explicit tool locations; anything left out is discovered.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ToolsConfig {
    pub server: Option<PathBuf>,
    pub install_db: Option<PathBuf>,
    pub admin: Option<PathBuf>,
    /// Installation prefix searched before `PATH`.
    pub basedir: Option<PathBuf>,
    /// Extra arguments for the initialization tool.
    #[serde(default)]
    pub init_args: Vec<String>,
}

/// Liveness poll settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PollConfig {
    pub max_attempts: Option<u32>,
    /// Delay between checks (e.g. `1s`, `250ms`).
    pub interval: Option<String>,
    pub backoff: Option<BackoffKind>,
    /// Multiplier for exponential backoff.
    pub factor: Option<f64>,
    /// Ceiling for a single exponential delay.
    pub max_interval: Option<String>,
}

impl PollConfig {
    /// Builds the [`PollPolicy`] described by these settings.
    pub fn policy(&self) -> Result<PollPolicy, ControlError> {
        let defaults = PollPolicy::default();

        let max_attempts = self.max_attempts.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ControlError::InvalidConfig(
                "poll.max_attempts must be at least 1".into(),
            ));
        }

        let interval = match self.interval.as_deref() {
            Some(raw) => parse_duration(raw)?,
            None => defaults.interval,
        };

        let backoff = match self.backoff.unwrap_or_default() {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => {
                let factor = self.factor.unwrap_or(2.0);
                if !factor.is_finite() || factor < 1.0 {
                    return Err(ControlError::InvalidConfig(format!(
                        "poll.factor must be at least 1.0, got {factor}"
                    )));
                }
                let max_interval = match self.max_interval.as_deref() {
                    Some(raw) => parse_duration(raw)?,
                    None => interval.saturating_mul(8),
                };
                Backoff::Exponential {
                    factor,
                    max_interval,
                }
            }
        };

        Ok(PollPolicy {
            max_attempts,
            interval,
            backoff,
        })
    }
}

impl Config {
    /// Builds the [`ProcessHandle`] this configuration describes.
    pub fn handle(&self) -> ProcessHandle {
        let mut handle = ProcessHandle::new(self.data_dir.clone(), self.pid_file.clone());
        handle.port = self.port;
        handle.socket = self.socket.clone();
        handle.error_sink = match &self.error_log {
            Some(path) => ErrorSink::File(path.clone()),
            None => ErrorSink::NoSyslog,
        };
        handle.console_log = self.console_log.clone();
        handle.flags = ServerFlags {
            skip_grant_tables: self.skip_grant_tables,
            skip_networking: self.skip_networking,
        };
        handle
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.data_dir);
        for path in [
            &mut self.pid_file,
            &mut self.socket,
            &mut self.error_log,
            &mut self.console_log,
            &mut self.tools.server,
            &mut self.tools.install_db,
            &mut self.tools.admin,
            &mut self.tools.basedir,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
    }
}

/// Parses a user-facing duration string in the format `<number>[ms|s|m|h]`.
pub fn parse_duration(raw: &str) -> Result<Duration, ControlError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ControlError::InvalidConfig(
            "Duration value cannot be empty".into(),
        ));
    }

    let (amount_str, millis) = if let Some(stripped) = value.strip_suffix("ms") {
        (stripped.trim(), 1)
    } else if let Some(stripped) = value.strip_suffix('s') {
        (stripped.trim(), 1_000)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped.trim(), 60_000)
    } else if let Some(stripped) = value.strip_suffix('h') {
        (stripped.trim(), 3_600_000)
    } else {
        (value, 1_000)
    };

    let amount: u64 = amount_str.parse().map_err(|_| {
        ControlError::InvalidConfig(format!("Invalid duration value: '{raw}'"))
    })?;

    Ok(Duration::from_millis(amount.saturating_mul(millis)))
}

/// Expands `$VAR` and `${VAR}` references within a string.
fn expand_env_vars(input: &str) -> Result<String, ControlError> {
    let re = Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?")
        .map_err(|err| ControlError::InvalidConfig(err.to_string()))?;

    let mut missing = Vec::new();
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.push(var_name.to_string());
            String::new()
        })
    });

    if !missing.is_empty() {
        return Err(ControlError::InvalidConfig(format!(
            "Missing environment variable(s): {}",
            missing.join(", ")
        )));
    }

    Ok(result.into_owned())
}

/// Loads and parses the configuration file, expanding environment variables and
/// resolving relative paths against the file's directory.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ControlError> {
    let config_path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG));

    let content = fs::read_to_string(config_path).map_err(|e| {
        ControlError::ConfigReadError(std::io::Error::new(
            e.kind(),
            format!("{} ({})", e, config_path.display()),
        ))
    })?;

    let expanded = expand_env_vars(&content)?;
    let mut config: Config = serde_yaml::from_str(&expanded)?;

    let base_path = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => env::current_dir()?,
    };
    config.resolve_paths(&base_path);
    config.project_dir = Some(base_path);

    // Reject bad poll settings before any command runs.
    config.poll.policy()?;

    Ok(config)
}
