//! Identity of a supervised server instance and the flags it is launched with.
use std::path::{Path, PathBuf};

/// Where the server sends its error log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorSink {
    /// Write errors to this file (`--log-error=`).
    File(PathBuf),
    /// Disable syslog so errors go to the server's standard error (`--skip-syslog`).
    #[default]
    NoSyslog,
}

/// Optional access-control and networking switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerFlags {
    /// Start without the privilege tables (`--skip-grant-tables`).
    pub skip_grant_tables: bool,
    /// Do not listen on TCP (`--skip-networking`).
    pub skip_networking: bool,
}

/// Identifies one supervised server: its data directory, PID file and endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    data_dir: PathBuf,
    pid_file: PathBuf,
    /// TCP port, if the server should listen on one.
    pub port: Option<u16>,
    /// Unix socket path.
    pub socket: Option<PathBuf>,
    pub error_sink: ErrorSink,
    /// File receiving the spawned server's stdout and stderr.
    pub console_log: Option<PathBuf>,
    pub flags: ServerFlags,
}

impl ProcessHandle {
    /// Creates a handle; the PID file defaults to `<data_dir>/server.pid`.
    pub fn new(data_dir: impl Into<PathBuf>, pid_file: Option<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let pid_file = pid_file.unwrap_or_else(|| data_dir.join("server.pid"));
        Self {
            data_dir,
            pid_file,
            port: None,
            socket: None,
            error_sink: ErrorSink::default(),
            console_log: None,
            flags: ServerFlags::default(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Error-log path, when logging to a file.
    pub fn error_log(&self) -> Option<&Path> {
        match &self.error_sink {
            ErrorSink::File(path) => Some(path),
            ErrorSink::NoSyslog => None,
        }
    }

    /// Sibling file used for the advisory lock around start/stop/init.
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .pid_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "server.pid".into());
        name.push(".lock");
        self.pid_file.with_file_name(name)
    }

    /// Arguments for launching the long-running server.
    pub fn server_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--datadir={}", self.data_dir.display()),
            format!("--pid-file={}", self.pid_file.display()),
        ];

        match &self.error_sink {
            ErrorSink::File(path) => args.push(format!("--log-error={}", path.display())),
            ErrorSink::NoSyslog => args.push("--skip-syslog".to_string()),
        }

        if let Some(port) = self.port {
            args.push(format!("--port={port}"));
        }
        if let Some(socket) = &self.socket {
            args.push(format!("--socket={}", socket.display()));
        }
        if self.flags.skip_grant_tables {
            args.push("--skip-grant-tables".to_string());
        }
        if self.flags.skip_networking {
            args.push("--skip-networking".to_string());
        }

        args
    }

    /// Arguments for the one-shot data-directory initialization tool.
    pub fn init_args(
        &self,
        user: Option<&str>,
        basedir: Option<&Path>,
        extra: &[String],
    ) -> Vec<String> {
        let mut args = vec![format!("--datadir={}", self.data_dir.display())];
        if let Some(user) = user {
            args.push(format!("--user={user}"));
        }
        if let Some(basedir) = basedir {
            args.push(format!("--basedir={}", basedir.display()));
        }
        args.extend(extra.iter().cloned());
        args
    }

    /// Connection arguments for administrative client tools.
    pub fn client_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(socket) = &self.socket {
            args.push(format!("--socket={}", socket.display()));
        }
        if let Some(port) = self.port {
            args.push("--protocol=tcp".to_string());
            args.push("--host=127.0.0.1".to_string());
            args.push(format!("--port={port}"));
        }
        args
    }
}
