//! One-shot command execution against real processes.

#[path = "common/mod.rs"]
mod common;

use std::path::Path;

use common::write_script;
use dbctl::{error::ControlError, runner};
use tempfile::tempdir;

#[test]
fn large_outputs_on_both_streams_are_captured() {
    let temp = tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "chatty",
        r#"i=0
while [ $i -lt 5000 ]; do
  echo "stdout line $i"
  echo "stderr line $i" 1>&2
  i=$((i + 1))
done
"#,
    );

    let result = runner::run::<&str>(&script, &[]).expect("run chatty");
    assert!(result.success());
    assert_eq!(result.stdout.lines().count(), 5000);
    assert_eq!(result.stderr.lines().count(), 5000);
    assert!(result.stdout.lines().all(|line| line.starts_with("stdout")));
    assert!(result.stderr.lines().all(|line| line.starts_with("stderr")));
}

#[test]
fn arguments_are_passed_verbatim() {
    let temp = tempdir().unwrap();
    let script = write_script(temp.path(), "args", "for a in \"$@\"; do echo \"[$a]\"; done\n");

    let result = runner::run(&script, &["--datadir=/srv/db", "two words", "$HOME"]).unwrap();
    assert_eq!(result.stdout, "[--datadir=/srv/db]\n[two words]\n[$HOME]\n");
    assert_eq!(
        result.argv,
        vec![
            script.display().to_string(),
            "--datadir=/srv/db".to_string(),
            "two words".to_string(),
            "$HOME".to_string(),
        ]
    );
}

#[test]
fn failing_command_keeps_its_output() {
    let temp = tempdir().unwrap();
    let script = write_script(
        temp.path(),
        "fails",
        "echo 'partial output'\necho 'data directory not writable' 1>&2\nexit 3\n",
    );

    let result = runner::run::<&str>(&script, &[]).unwrap();
    assert_eq!(result.exit, 3);
    assert!(!result.success());
    assert_eq!(result.stdout, "partial output\n");
    assert_eq!(result.stderr, "data directory not writable\n");
}

#[test]
fn command_killed_by_signal_is_an_execution_error() {
    let temp = tempdir().unwrap();
    let script = write_script(temp.path(), "suicide", "echo before\nkill -KILL $$\n");

    match runner::run::<&str>(&script, &[]) {
        Err(ControlError::KilledBySignal { program, signal }) => {
            assert_eq!(signal, 9);
            assert!(program.ends_with("suicide"));
        }
        other => panic!("expected KilledBySignal, got {other:?}"),
    }
}

#[test]
fn non_executable_file_cannot_be_launched() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("plain.txt");
    std::fs::write(&path, "not a program").unwrap();

    assert!(matches!(
        runner::run::<&str>(Path::new(&path), &[]),
        Err(ControlError::Execution { .. })
    ));
}
