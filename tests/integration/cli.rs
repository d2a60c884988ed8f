#[path = "common/mod.rs"]
mod common;

use std::{
    fs,
    path::{Path, PathBuf},
};

use assert_cmd::Command;
use common::{fake_install_db, fake_server, never_ready_server};
use predicates::{prelude::*, str::contains};
use tempfile::tempdir;

fn write_config(dir: &Path, server: &Path, install: &Path) -> PathBuf {
    let config_path = dir.join("dbctl.yaml");
    fs::write(
        &config_path,
        format!(
            r#"data_dir: data
console_log: console.log
tools:
  server: {}
  install_db: {}
poll:
  max_attempts: 50
  interval: 100ms
"#,
            server.display(),
            install.display(),
        ),
    )
    .expect("failed to write config");
    config_path
}

fn dbctl(config: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dbctl"));
    cmd.arg("--config").arg(config).args(args);
    cmd
}

#[test]
fn full_lifecycle_through_cli() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let server = fake_server(dir, &dir.join("launches.log"));
    let install = fake_install_db(dir, &dir.join("install.args"));
    let config = write_config(dir, &server, &install);

    dbctl(&config, &["status"])
        .assert()
        .failure()
        .stdout(contains("server is not running"));

    dbctl(&config, &["init"])
        .assert()
        .success()
        .stdout(contains("installed into"));

    dbctl(&config, &["start"])
        .assert()
        .success()
        .stdout(contains("server is running"));

    dbctl(&config, &["start"])
        .assert()
        .failure()
        .stderr(contains("server is already running"));

    dbctl(&config, &["status", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""running":true"#));

    dbctl(&config, &["stop"])
        .assert()
        .success()
        .stdout(contains("server stopped"));

    dbctl(&config, &["stop"])
        .assert()
        .failure()
        .stderr(contains("server is not running"));
}

#[test]
fn init_twice_fails_with_precondition() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let server = fake_server(dir, &dir.join("launches.log"));
    let install = fake_install_db(dir, &dir.join("install.args"));
    let config = write_config(dir, &server, &install);

    dbctl(&config, &["init"]).assert().success();
    dbctl(&config, &["init"])
        .assert()
        .failure()
        .stderr(contains("data directory is not empty"));
}

#[test]
fn start_reports_server_that_never_comes_up() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let server = never_ready_server(dir);
    let install = fake_install_db(dir, &dir.join("install.args"));
    let config = write_config(dir, &server, &install);
    fs::create_dir_all(dir.join("data")).unwrap();

    dbctl(&config, &["start", "--attempts", "3", "--interval", "50ms"])
        .assert()
        .failure()
        .stderr(contains("server did not start"));
}

#[test]
fn missing_tool_is_reported() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let config = write_config(
        dir,
        &dir.join("no-such-server"),
        &dir.join("no-such-install"),
    );

    dbctl(&config, &["start"])
        .assert()
        .failure()
        .stderr(contains("Could not find 'server'"));
}

#[test]
fn missing_config_is_reported() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent.yaml");

    dbctl(&missing, &["status"])
        .assert()
        .failure()
        .stderr(contains("Failed to read config file"));
}

#[test]
fn logs_show_console_output_tail() {
    let temp = tempdir().expect("failed to create tempdir");
    let dir = temp.path();
    let server = fake_server(dir, &dir.join("launches.log"));
    let install = fake_install_db(dir, &dir.join("install.args"));
    let config = write_config(dir, &server, &install);
    fs::write(dir.join("console.log"), "first\nsecond\nthird\n").unwrap();

    dbctl(&config, &["logs", "-n", "2"])
        .assert()
        .success()
        .stdout(contains("second\nthird").and(contains("first").not()));
}
