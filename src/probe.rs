//! Liveness detection through the server's PID file.
use std::{fmt, fs, path::Path};

use nix::{errno::Errno, sys::signal, unistd::Pid};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Answer of a platform process-existence query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// A process with the id exists and may be signalled by us.
    Alive,
    /// No process with the id exists.
    Dead,
    /// A process with the id exists but we lack permission to signal it.
    Inaccessible,
}

/// Platform capability answering "does a process with this id exist".
pub trait ProcessProbe: Send + Sync {
    /// Queries the operating system for `pid`.
    fn probe(&self, pid: i32) -> Liveness;
}

/// Probe built on `kill(pid, 0)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn probe(&self, pid: i32) -> Liveness {
        if pid <= 0 {
            // 0 and negative ids address process groups, not a single process.
            return Liveness::Dead;
        }
        match signal::kill(Pid::from_raw(pid), None) {
            Ok(()) => Liveness::Alive,
            Err(Errno::ESRCH) => Liveness::Dead,
            Err(Errno::EPERM) => Liveness::Inaccessible,
            Err(err) => {
                warn!("Unexpected error probing PID {pid}: {err}");
                Liveness::Dead
            }
        }
    }
}

/// Probe built on a process-table snapshot instead of a signal.
///
/// A process table cannot tell permission problems apart, so this probe never
/// reports [`Liveness::Inaccessible`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTableProbe;

impl ProcessProbe for ProcessTableProbe {
    fn probe(&self, pid: i32) -> Liveness {
        let Ok(raw) = u32::try_from(pid) else {
            return Liveness::Dead;
        };
        let target = sysinfo::Pid::from_u32(raw);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        match system.process(target) {
            Some(process) if !is_zombie(process.status()) => Liveness::Alive,
            _ => Liveness::Dead,
        }
    }
}

fn is_zombie(status: sysinfo::ProcessStatus) -> bool {
    matches!(
        status,
        sysinfo::ProcessStatus::Zombie | sysinfo::ProcessStatus::Dead
    )
}

/// Returns the default probe, [`SignalProbe`].
///
/// dbctl targets unix hosts only; [`ProcessTableProbe`] is available to callers
/// that want to avoid signalling the process.
pub fn native_probe() -> Box<dyn ProcessProbe> {
    Box::new(SignalProbe)
}

/// Reads the process id recorded in a PID file.
///
/// Only the first line is considered. A missing, unreadable or malformed file
/// yields `None`.
pub fn read_pid(pid_file: &Path) -> Option<i32> {
    let contents = match fs::read_to_string(pid_file) {
        Ok(contents) => contents,
        Err(err) => {
            debug!("PID file {} not readable: {err}", pid_file.display());
            return None;
        }
    };

    let first = contents.lines().next()?.trim();
    match first.parse::<i32>() {
        Ok(pid) if pid > 0 => Some(pid),
        _ => {
            warn!(
                "PID file {} does not hold a process id: {first:?}",
                pid_file.display()
            );
            None
        }
    }
}

/// Observed state of a supervised server, derived from its PID file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No usable PID file.
    NoPidFile,
    /// The PID file names a process that no longer exists.
    Stale(i32),
    /// The recorded process exists.
    Running(i32),
    /// The recorded process exists but cannot be signalled by this user.
    Inaccessible(i32),
}

impl ServerState {
    /// Whether a live process backs the PID file.
    pub fn is_up(self) -> bool {
        matches!(self, ServerState::Running(_) | ServerState::Inaccessible(_))
    }

    /// The recorded pid, when there is one.
    pub fn pid(self) -> Option<i32> {
        match self {
            ServerState::NoPidFile => None,
            ServerState::Stale(pid)
            | ServerState::Running(pid)
            | ServerState::Inaccessible(pid) => Some(pid),
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::NoPidFile => write!(f, "server is not running"),
            ServerState::Stale(pid) => {
                write!(f, "server is not running (stale pid file for pid {pid})")
            }
            ServerState::Running(pid) => write!(f, "server is running (pid {pid})"),
            ServerState::Inaccessible(pid) => write!(
                f,
                "server is running (pid {pid}, not signalable by this user)"
            ),
        }
    }
}

/// Combines PID-file reading with a [`ProcessProbe`].
///
/// The prober does not verify that the recorded process is actually the server
/// binary; a recycled pid reads as up.
pub struct LivenessProber {
    probe: Box<dyn ProcessProbe>,
}

impl LivenessProber {
    pub fn new(probe: Box<dyn ProcessProbe>) -> Self {
        Self { probe }
    }

    /// Classifies the server behind `pid_file`.
    pub fn inspect(&self, pid_file: &Path) -> ServerState {
        let Some(pid) = read_pid(pid_file) else {
            return ServerState::NoPidFile;
        };
        match self.probe.probe(pid) {
            Liveness::Alive => ServerState::Running(pid),
            Liveness::Dead => ServerState::Stale(pid),
            Liveness::Inaccessible => ServerState::Inaccessible(pid),
        }
    }

    /// Whether a live process backs `pid_file`.
    pub fn is_up(&self, pid_file: &Path) -> bool {
        self.inspect(pid_file).is_up()
    }
}

impl Default for LivenessProber {
    fn default() -> Self {
        Self::new(native_probe())
    }
}

impl fmt::Debug for LivenessProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessProber").finish_non_exhaustive()
    }
}
