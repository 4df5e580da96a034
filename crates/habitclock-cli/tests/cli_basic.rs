//! Basic CLI E2E tests.
//!
//! Each test runs the binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_habitclock"))
        .args(args)
        .env("HABITCLOCK_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let stdout = run_ok(data_dir, args);
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_target_add_and_list() {
    let dir = TempDir::new().unwrap();
    let out = run_ok(
        dir.path(),
        &["target", "add", "com.example.app", "--reset", "05:30", "--label", "Example"],
    );
    assert!(out.contains("tracking com.example.app"));
    assert!(out.contains("05:30"));

    let list = run_json(dir.path(), &["target", "list", "--json"]);
    let rows = list.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "com.example.app");
    assert_eq!(rows[0]["label"], "Example");
    assert_eq!(rows[0]["reset_time"], "05:30");
    assert_eq!(rows[0]["done"], false);
}

#[test]
fn test_target_done_and_undo() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["target", "add", "a"]);

    let out = run_ok(dir.path(), &["target", "done", "a"]);
    assert!(out.contains("a done for cycle"));
    let list = run_json(dir.path(), &["target", "list", "--json"]);
    assert_eq!(list[0]["done"], true);

    run_ok(dir.path(), &["target", "undo", "a"]);
    let list = run_json(dir.path(), &["target", "list", "--json"]);
    assert_eq!(list[0]["done"], false);
}

#[test]
fn test_done_with_new_reset_time() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["target", "add", "a", "--reset", "04:00"]);
    let out = run_ok(dir.path(), &["target", "done", "a", "--reset", "06:00"]);
    assert!(out.contains("reset time is now 06:00"));

    let list = run_json(dir.path(), &["target", "list", "--json"]);
    assert_eq!(list[0]["reset_time"], "06:00");
    assert_eq!(list[0]["done"], true);
}

#[test]
fn test_done_requires_tracked_target() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["target", "done", "nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_invalid_reset_time_rejected() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["target", "add", "a", "--reset", "25:00"]);
    assert_ne!(code, 0);
}

#[test]
fn test_target_remove() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["target", "add", "a", "--label", "A"]);
    run_ok(dir.path(), &["target", "add", "b"]);
    run_ok(dir.path(), &["target", "remove", "a"]);

    let list = run_json(dir.path(), &["target", "list", "--json"]);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["b"]);

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "labels.a"]);
    assert_ne!(code, 0);
}

#[test]
fn test_target_cycle() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["target", "add", "a", "--reset", "03:00"]);
    let out = run_ok(dir.path(), &["target", "cycle", "a"]);
    assert!(out.contains("cycle:"));
    assert!(out.contains("deadline:"));
    assert!(out.contains("03:00"));
    assert!(out.contains("remaining:"));
}

#[test]
fn test_settings_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = run_json(dir.path(), &["settings", "show", "--json"]);
    assert_eq!(settings["alerts_enabled"], false);
    assert_eq!(settings["lead_minutes"], 60);
    assert_eq!(settings["tracked"].as_array().unwrap().len(), 0);
}

#[test]
fn test_settings_alerts_and_lead() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["settings", "alerts", "on"]);
    let out = run_ok(dir.path(), &["settings", "lead", "90"]);
    assert!(out.contains("90 minutes"));

    let settings = run_json(dir.path(), &["settings", "show", "--json"]);
    assert_eq!(settings["alerts_enabled"], true);
    assert_eq!(settings["lead_minutes"], 90);
}

#[test]
fn test_settings_lead_out_of_range() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["settings", "lead", "0"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(dir.path(), &["settings", "lead", "1441"]);
    assert_ne!(code, 0);
}

#[test]
fn test_status_json() {
    let dir = TempDir::new().unwrap();
    run_ok(dir.path(), &["target", "add", "a", "--label", "Alpha"]);
    run_ok(dir.path(), &["target", "add", "b"]);
    run_ok(dir.path(), &["target", "done", "b"]);

    let board = run_json(dir.path(), &["status", "--json"]);
    let entries = board.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // pending first
    assert_eq!(entries[0]["id"], "a");
    assert_eq!(entries[0]["label"], "Alpha");
    assert_eq!(entries[1]["id"], "b");
    assert_eq!(entries[1]["done"], true);
    assert_eq!(entries[1]["remaining_text"], "Done");
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    assert_eq!(run_ok(dir.path(), &["config", "get", "timer.precise"]).trim(), "true");

    run_ok(dir.path(), &["config", "set", "daemon.poll_interval_secs", "2"]);
    assert_eq!(
        run_ok(dir.path(), &["config", "get", "daemon.poll_interval_secs"]).trim(),
        "2"
    );

    run_ok(dir.path(), &["config", "reset"]);
    assert_eq!(
        run_ok(dir.path(), &["config", "get", "daemon.poll_interval_secs"]).trim(),
        "5"
    );
}

#[test]
fn test_config_unknown_key() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "no.such.key", "1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_list() {
    let dir = TempDir::new().unwrap();
    let out = run_ok(dir.path(), &["config", "list"]);
    assert!(out.contains("[engine]"));
    assert!(out.contains("[daemon]"));
    assert!(out.contains("poll_interval_secs = 5"));
}
