//! End-to-end tests for the daemon CLI.
//!
//! Every test runs the real binary against its own lock, PID and log files
//! in a temporary directory, with an in-memory graph and an ephemeral port.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn egregore(dir: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_egregore"));
    command
        .args(args)
        .current_dir(dir)
        .env_remove("EGREGORE_API_KEY")
        .env("EGREGORE_LOCK_FILE", dir.join("egregore.lock"))
        .env("EGREGORE_PID_FILE", dir.join("egregore.pid"))
        .env("EGREGORE_LOG_FILE", dir.join("egregore.log"))
        .env("EGREGORE_BACKEND", "memory")
        .env("EGREGORE_INDEX", "memory")
        .env("EGREGORE_PORT", "0");
    command
}

fn run(dir: &Path, args: &[&str]) -> Output {
    egregore(dir, args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stops the daemon even when an assertion fails half-way.
struct StopOnDrop<'a>(&'a Path);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        let _ = run(self.0, &["stop"]);
    }
}

#[test]
fn test_status_on_fresh_install() {
    let dir = TempDir::new().unwrap();

    let output = run(dir.path(), &["status"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("STOPPED"));
}

#[test]
fn test_start_status_stop_cycle() {
    let dir = TempDir::new().unwrap();
    let _cleanup = StopOnDrop(dir.path());

    let output = run(dir.path(), &["start"]);
    assert!(
        output.status.success(),
        "start failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Egregore started"));

    let output = run(dir.path(), &["--json-mode", "status"]);
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["state"], "RUNNING");
    assert!(status["pid"].is_u64());

    // A second start fails fast and leaves the first daemon alone.
    let output = run(dir.path(), &["start"]);
    assert!(!output.status.success());

    let output = run(dir.path(), &["stop"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("stopped"));

    let output = run(dir.path(), &["status"]);
    assert!(stdout(&output).contains("STOPPED"));
    assert!(!dir.path().join("egregore.pid").exists());

    let output = run(dir.path(), &["logs", "-n", "200"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("egregore running"));
}

fn running_pid(dir: &Path) -> u64 {
    let output = run(dir, &["--json-mode", "status"]);
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["state"], "RUNNING");
    status["pid"].as_u64().unwrap()
}

#[test]
fn test_restart_replaces_the_daemon() {
    let dir = TempDir::new().unwrap();
    let _cleanup = StopOnDrop(dir.path());

    assert!(run(dir.path(), &["start"]).status.success());
    let before = running_pid(dir.path());

    let output = run(dir.path(), &["restart"]);
    assert!(
        output.status.success(),
        "restart failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).contains("Egregore restarted"));

    let after = running_pid(dir.path());
    assert_ne!(before, after);
    let recorded = std::fs::read_to_string(dir.path().join("egregore.pid")).unwrap();
    assert_eq!(recorded.trim(), after.to_string());
}

#[test]
fn test_restart_when_stopped_starts() {
    let dir = TempDir::new().unwrap();
    let _cleanup = StopOnDrop(dir.path());

    let output = run(dir.path(), &["restart"]);
    assert!(output.status.success());
    running_pid(dir.path());
}

#[test]
fn test_concurrent_starts_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let _cleanup = StopOnDrop(dir.path());

    let first = egregore(dir.path(), &["start"]).spawn().unwrap();
    let second = egregore(dir.path(), &["start"]).spawn().unwrap();

    let successes = [first, second]
        .into_iter()
        .map(|child| child.wait_with_output().unwrap())
        .filter(|output| output.status.success())
        .count();
    assert_eq!(successes, 1);

    let output = run(dir.path(), &["status"]);
    assert!(stdout(&output).contains("RUNNING"));
}

#[test]
fn test_stale_pid_record_reports_stopped() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("egregore.pid"), "999999\n").unwrap();

    let output = run(dir.path(), &["status"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("STOPPED"));
    assert!(!dir.path().join("egregore.pid").exists());
}

#[test]
fn test_stop_when_not_running() {
    let dir = TempDir::new().unwrap();

    let output = run(dir.path(), &["stop"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("not running"));
}
