//! Start/stop orchestration of a single database server instance.
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use nix::{sys::signal, unistd::Pid};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::ControlError,
    handle::ProcessHandle,
    policy::{CancelToken, PollOutcome, PollPolicy, poll_until},
    probe::{LivenessProber, ServerState},
    result::{
        ALREADY_RUNNING, CommandResult, DID_NOT_START, DID_NOT_STOP, NOT_RUNNING,
        START_CANCELLED, STOP_CANCELLED, SupervisorResult,
    },
    runner,
    tools::Toolchain,
};

/// Exclusive advisory lock released on drop.
#[derive(Debug)]
struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    fn acquire(file: File, path: PathBuf) -> Result<Self, ControlError> {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!("Acquired lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(err)
                if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                Err(ControlError::Locked { path })
            }
            Err(err) => Err(ControlError::Io(err)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {err}", self.path.display());
        }
    }
}

/// Drives one server instance through init, start, stop and status.
///
/// Operations block the calling thread for up to the poll policy's ceiling.
/// Concurrent callers against the same PID file are serialised by an advisory
/// lock when locking is enabled; without it, two concurrent `start` calls can
/// both observe the server down and spawn two servers.
#[derive(Debug)]
pub struct Supervisor {
    handle: ProcessHandle,
    tools: Toolchain,
    policy: PollPolicy,
    prober: LivenessProber,
    cancel: CancelToken,
    user: Option<String>,
    use_lock: bool,
}

impl Supervisor {
    /// Creates a supervisor with the default poll policy and native prober.
    pub fn new(handle: ProcessHandle, tools: Toolchain) -> Self {
        Self {
            handle,
            tools,
            policy: PollPolicy::default(),
            prober: LivenessProber::default(),
            cancel: CancelToken::new(),
            user: None,
            use_lock: true,
        }
    }

    /// Builds a supervisor from configuration, resolving tools against
    /// `search_dirs`.
    pub fn from_config(config: &Config, search_dirs: &[PathBuf]) -> Result<Self, ControlError> {
        let tools = Toolchain::resolve(&config.tools, search_dirs)?;
        let policy = config.poll.policy()?;
        Ok(Self::new(config.handle(), tools)
            .with_policy(policy)
            .with_user(config.user.clone())
            .with_lock(config.lock))
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prober(mut self, prober: LivenessProber) -> Self {
        self.prober = prober;
        self
    }

    /// Uses `token` to abort liveness polls early.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Account passed to the initialization tool.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.user = user;
        self
    }

    pub fn with_lock(mut self, enabled: bool) -> Self {
        self.use_lock = enabled;
        self
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    pub fn tools(&self) -> &Toolchain {
        &self.tools
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// A clone of the token that cancels this supervisor's polls.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current state derived from the PID file.
    pub fn state(&self) -> ServerState {
        self.prober.inspect(self.handle.pid_file())
    }

    pub fn is_up(&self) -> bool {
        self.state().is_up()
    }

    /// Reports whether the server is up; `success` mirrors liveness.
    pub fn status(&self) -> SupervisorResult {
        let state = self.state();
        debug!("Status of {}: {state:?}", self.handle.data_dir().display());
        SupervisorResult {
            success: state.is_up(),
            message: Some(state.to_string()),
        }
    }

    /// Initializes an empty data directory with the install tool.
    ///
    /// The directory is created when missing. Both the PID-file lock and a lock
    /// on the directory itself are held from the emptiness check through the
    /// tool run, so `init` excludes concurrent `init`, `start` and `stop` calls.
    /// A non-empty directory is rejected before anything is launched.
    pub fn init(&self) -> Result<CommandResult, ControlError> {
        let data_dir = self.handle.data_dir();
        create_data_dir(data_dir)?;
        let _pid_lock = self.lock_pid_file()?;
        let _dir_lock = self.lock_data_dir()?;
        ensure_empty_dir(data_dir, &self.handle.lock_file())?;

        let args = self.handle.init_args(
            self.user.as_deref(),
            self.tools.basedir.as_deref(),
            &self.tools.init_args,
        );
        info!("Initializing data directory {}", data_dir.display());
        let result = runner::run(&self.tools.install_db, &args)?;

        if result.success() {
            info!("Initialized data directory {}", data_dir.display());
        } else {
            warn!(
                "Initialization of {} exited with status {}",
                data_dir.display(),
                result.exit
            );
        }
        Ok(result)
    }

    /// Spawns the server and waits for its PID file to name a live process.
    pub fn start(&self) -> Result<SupervisorResult, ControlError> {
        let _lock = self.lock_pid_file()?;
        self.start_locked()
    }

    fn start_locked(&self) -> Result<SupervisorResult, ControlError> {
        let pid_file = self.handle.pid_file();

        match self.state() {
            state if state.is_up() => {
                info!("Start skipped: {state}");
                return Ok(SupervisorResult::failed(ALREADY_RUNNING));
            }
            ServerState::Stale(pid) => {
                warn!(
                    "Ignoring stale PID file {} (pid {pid} is gone)",
                    pid_file.display()
                );
            }
            _ => {}
        }

        let args = self.handle.server_args();
        let child = runner::spawn_detached(
            &self.tools.server,
            &args,
            self.handle.console_log.as_deref(),
        )?;
        info!(
            "Spawned server (PID {child}); waiting for {}",
            pid_file.display()
        );

        match poll_until(&self.policy, &self.cancel, || self.prober.is_up(pid_file)) {
            PollOutcome::Satisfied { attempts } => {
                let state = self.state();
                info!("Server is up after {attempts} check(s): {state}");
                Ok(SupervisorResult::ok_with(state.to_string()))
            }
            PollOutcome::Exhausted => {
                warn!(
                    "Server did not report up within {:?}",
                    self.policy.ceiling()
                );
                Ok(SupervisorResult::failed(DID_NOT_START))
            }
            PollOutcome::Cancelled => {
                warn!("Start cancelled; spawned PID {child} left as is");
                Ok(SupervisorResult::failed(START_CANCELLED))
            }
        }
    }

    /// Sends SIGTERM to the recorded pid and waits for it to go away.
    pub fn stop(&self) -> Result<SupervisorResult, ControlError> {
        let _lock = self.lock_pid_file()?;
        self.stop_locked()
    }

    fn stop_locked(&self) -> Result<SupervisorResult, ControlError> {
        let pid_file = self.handle.pid_file();

        let pid = match self.state() {
            ServerState::Running(pid) | ServerState::Inaccessible(pid) => pid,
            state => {
                info!("Stop skipped: {state}");
                return Ok(SupervisorResult::failed(NOT_RUNNING));
            }
        };

        info!("Stopping server (PID {pid})");
        signal::kill(Pid::from_raw(pid), signal::Signal::SIGTERM).map_err(|source| {
            warn!("Failed to send SIGTERM to PID {pid}: {source}");
            ControlError::Signal { pid, source }
        })?;

        match poll_until(&self.policy, &self.cancel, || !self.prober.is_up(pid_file)) {
            PollOutcome::Satisfied { attempts } => {
                info!("Server (PID {pid}) stopped after {attempts} check(s)");
                Ok(SupervisorResult::ok_with("server stopped"))
            }
            PollOutcome::Exhausted => {
                warn!(
                    "Server (PID {pid}) still running after {:?}",
                    self.policy.ceiling()
                );
                Ok(SupervisorResult::failed(DID_NOT_STOP))
            }
            PollOutcome::Cancelled => {
                warn!("Stop cancelled; PID {pid} already signalled");
                Ok(SupervisorResult::failed(STOP_CANCELLED))
            }
        }
    }

    /// Stops the server if it is running, then starts it.
    ///
    /// One lock is held across both halves so no other caller can start or
    /// stop the server in between.
    pub fn restart(&self) -> Result<SupervisorResult, ControlError> {
        let _lock = self.lock_pid_file()?;
        let stopped = self.stop_locked()?;
        if !stopped.success && stopped.message() != Some(NOT_RUNNING) {
            return Ok(stopped);
        }
        self.start_locked()
    }

    /// Creates database `name` through the admin tool.
    pub fn create_database(&self, name: &str) -> Result<CommandResult, ControlError> {
        if name.trim().is_empty() {
            return Err(ControlError::Precondition {
                path: self.handle.data_dir().to_path_buf(),
                reason: "database name must not be empty".to_string(),
            });
        }
        let admin = self.tools.admin()?;

        let mut args = self.handle.client_args();
        args.push("create".to_string());
        args.push(name.to_string());

        info!("Creating database '{name}'");
        runner::run(admin, &args)
    }

    fn lock_pid_file(&self) -> Result<Option<LockGuard>, ControlError> {
        if !self.use_lock {
            return Ok(None);
        }
        let path = self.handle.lock_file();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            // No directory means no PID file and nothing to race on.
            debug!("Skipping lock: {} does not exist", parent.display());
            return Ok(None);
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        LockGuard::acquire(file, path).map(Some)
    }

    /// Locks the data directory itself so that no lock file lands inside it.
    fn lock_data_dir(&self) -> Result<Option<LockGuard>, ControlError> {
        if !self.use_lock {
            return Ok(None);
        }
        let path = self.handle.data_dir().to_path_buf();
        let file = File::open(&path)?;
        LockGuard::acquire(file, path).map(Some)
    }
}

/// Creates `dir` if missing; fails when the path exists but is not a directory.
fn create_data_dir(dir: &Path) -> Result<(), ControlError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(ControlError::Precondition {
            path: dir.to_path_buf(),
            reason: "data directory path is not a directory".to_string(),
        });
    }
    debug!("Creating data directory {}", dir.display());
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Fails when `dir` holds anything besides our own `lock_file`.
fn ensure_empty_dir(dir: &Path, lock_file: &Path) -> Result<(), ControlError> {
    let mut foreign = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.path() != lock_file);
    if foreign.next().is_some() {
        return Err(ControlError::Precondition {
            path: dir.to_path_buf(),
            reason: "data directory is not empty".to_string(),
        });
    }
    Ok(())
}
