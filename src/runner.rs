//! Execution of external commands: one-shot runs and detached spawns.
use std::{
    ffi::OsStr,
    fs::OpenOptions,
    os::unix::process::{CommandExt, ExitStatusExt},
    path::Path,
    process::{Command, Stdio},
    thread,
};

use tracing::{debug, error, warn};

use crate::{error::ControlError, result::CommandResult};

fn render_argv<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Vec<String> {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(
            args.iter()
                .map(|arg| arg.as_ref().to_string_lossy().into_owned()),
        )
        .collect()
}

/// Runs `program` with `args` to completion, capturing stdout and stderr.
///
/// A non-zero exit is returned as a [`CommandResult`]; the caller decides what to
/// do with it. Launch failures and termination by a signal are errors.
pub fn run<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
) -> Result<CommandResult, ControlError> {
    let argv = render_argv(program, args);
    debug!("Executing command: {}", argv.join(" "));

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| {
            error!("Failed to launch '{}': {source}", program.display());
            ControlError::Execution {
                program: program.display().to_string(),
                source,
            }
        })?;

    let exit = match (output.status.code(), output.status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => {
            warn!("'{}' was killed by signal {signal}", program.display());
            return Err(ControlError::KilledBySignal {
                program: program.display().to_string(),
                signal,
            });
        }
        (None, None) => {
            return Err(ControlError::Execution {
                program: program.display().to_string(),
                source: std::io::Error::other("process ended without an exit status"),
            });
        }
    };

    let result = CommandResult {
        argv,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit,
    };

    if result.success() {
        debug!("Command `{}` completed successfully", result.command_line());
    } else {
        warn!(
            "Command `{}` exited with status {}",
            result.command_line(),
            result.exit
        );
    }

    Ok(result)
}

/// Starts `program` in its own session without waiting for it.
///
/// Standard input is `/dev/null`; standard output and error are appended to
/// `console` when given, otherwise discarded. The child is reaped on a background
/// thread so it never lingers as a zombie of the caller. Returns the child's pid.
pub fn spawn_detached<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    console: Option<&Path>,
) -> Result<u32, ControlError> {
    let argv = render_argv(program, args);
    debug!("Spawning detached: {}", argv.join(" "));

    let launch_error = |source: std::io::Error| {
        error!("Failed to launch '{}': {source}", program.display());
        ControlError::Execution {
            program: program.display().to_string(),
            source,
        }
    };

    let (stdout, stderr) = match console {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(launch_error)?;
            let clone = file.try_clone().map_err(launch_error)?;
            (Stdio::from(file), Stdio::from(clone))
        }
        None => (Stdio::null(), Stdio::null()),
    };

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).stdout(stdout).stderr(stderr);

    unsafe {
        cmd.pre_exec(|| {
            // Leave the caller's session so terminal signals do not reach the server.
            if libc::setsid() < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn().map_err(launch_error)?;
    let pid = child.id();
    debug!("'{}' spawned with PID {pid}", program.display());

    let name = program.display().to_string();
    thread::spawn(move || match child.wait() {
        Ok(status) => debug!("Detached '{name}' (PID {pid}) exited: {status}"),
        Err(err) => warn!("Failed to reap detached '{name}' (PID {pid}): {err}"),
    });

    Ok(pid)
}
