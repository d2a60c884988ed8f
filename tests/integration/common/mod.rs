#![allow(dead_code)]

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use dbctl::{
    handle::ProcessHandle,
    policy::PollPolicy,
    supervisor::Supervisor,
    tools::Toolchain,
};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Writes an executable shell script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// A server that writes its PID file after `delay` seconds, removes it on
/// SIGTERM, and appends one line per launch to `launches`.
pub fn fake_server_with_delay(dir: &Path, launches: &Path, delay: &str) -> PathBuf {
    write_script(
        dir,
        "fake-server",
        &format!(
            r#"pidfile=""
for arg in "$@"; do
  case "$arg" in
    --pid-file=*) pidfile="${{arg#--pid-file=}}" ;;
  esac
done
[ -n "$pidfile" ] || exit 2
echo "$*" >> "{launches}"
trap 'rm -f "$pidfile"; exit 0' TERM
sleep {delay}
echo $$ > "$pidfile"
while :; do
  sleep 1 &
  wait $!
done
"#,
            launches = launches.display(),
        ),
    )
}

/// A server that becomes ready immediately.
pub fn fake_server(dir: &Path, launches: &Path) -> PathBuf {
    fake_server_with_delay(dir, launches, "0")
}

/// A server that ignores SIGTERM.
pub fn stubborn_server(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "stubborn-server",
        r#"for arg in "$@"; do
  case "$arg" in
    --pid-file=*) pidfile="${arg#--pid-file=}" ;;
  esac
done
trap '' TERM
echo $$ > "$pidfile"
while :; do
  sleep 1
done
"#,
    )
}

/// A server that exits at once without writing a PID file.
pub fn never_ready_server(dir: &Path) -> PathBuf {
    write_script(dir, "never-ready", "exit 0\n")
}

/// An initializer that populates the data directory and records its arguments.
pub fn fake_install_db(dir: &Path, record: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-install-db",
        &format!(
            r#"for arg in "$@"; do
  case "$arg" in
    --datadir=*) datadir="${{arg#--datadir=}}" ;;
  esac
done
echo "$*" > "{record}"
mkdir -p "$datadir/mysql"
echo "installed into $datadir"
"#,
            record = record.display(),
        ),
    )
}

/// An admin client that records its arguments.
pub fn fake_admin(dir: &Path, record: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-admin",
        &format!("echo \"$*\" > \"{}\"\n", record.display()),
    )
}

/// Fast poll policy for tests.
pub fn quick_policy() -> PollPolicy {
    PollPolicy::fixed(50, Duration::from_millis(100))
}

/// Supervisor over `<root>/data` driving the given tools.
pub fn supervisor(root: &Path, server: &Path, install_db: &Path) -> Supervisor {
    let handle = ProcessHandle::new(root.join("data"), None);
    Supervisor::new(handle, Toolchain::new(server, install_db)).with_policy(quick_policy())
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|content| content.lines().map(|line| line.to_string()).collect())
        .unwrap_or_default()
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .process(Pid::from_u32(pid))
        .is_some_and(|process| !matches!(process.status(), ProcessStatus::Zombie))
}

/// Sends SIGKILL to `pid`, ignoring errors; used to clean up after tests.
pub fn force_kill(pid: i32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid),
        nix::sys::signal::Signal::SIGKILL,
    );
}
