//! Smoke tests for the ensayador CLI
//!
//! None of these launch a browser.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the ensayador binary
fn ensayador() -> Command {
    let mut cmd = Command::cargo_bin("ensayador").expect("ensayador binary should exist");
    cmd.env_remove("ENSAYO_BASE_URL")
        .env_remove("ENSAYO_HEADLESS")
        .env_remove("ENSAYO_CONFIG")
        .env_remove("CHROMIUM_PATH")
        .env_remove("RUST_LOG");
    cmd
}

/// Bundled scenario directory
fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    ensayador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.2.0"));
}

#[test]
fn test_help_flag() {
    ensayador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    ensayador().assert().failure();
}

#[test]
fn test_run_help_lists_flags() {
    ensayador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--base-url"))
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--format"));
}

// ============================================================================
// Validate / List
// ============================================================================

#[test]
fn test_validate_bundled_scenarios() {
    ensayador()
        .args(["--color", "never", "validate"])
        .arg(scenarios_dir())
        .assert()
        .success()
        .stderr(predicate::str::contains("registration"))
        .stderr(predicate::str::contains("password_policy"))
        .stderr(predicate::str::contains("login_page"));
}

#[test]
fn test_validate_reports_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "name: broken\nsteps: []\n").unwrap();

    ensayador()
        .args(["--color", "never", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAIL"))
        .stderr(predicate::str::contains("at least one step"));
}

#[test]
fn test_validate_missing_file() {
    ensayador()
        .args(["validate", "/nonexistent/scenario.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_list_bundled_scenarios() {
    ensayador()
        .arg("list")
        .arg(scenarios_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("registration"))
        .stdout(predicate::str::contains("expectations"));
}

#[test]
fn test_list_unknown_tag() {
    ensayador()
        .arg("list")
        .arg(scenarios_dir())
        .args(["--tag", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no scenarios tagged"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_defaults() {
    ensayador()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://localhost:3000"))
        .stdout(predicate::str::contains("action_timeout_ms: 5000"));
}

#[test]
fn test_config_layers_file_env_and_flags() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ensayo.yaml");
    fs::write(&path, "base_url: http://file:1\nexpect_timeout_ms: 9000\n").unwrap();

    ensayador()
        .arg("--config")
        .arg(&path)
        .env("ENSAYO_BASE_URL", "http://env:2")
        .args(["config", "--format", "json", "--jobs", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"base_url\": \"http://env:2\""))
        .stdout(predicate::str::contains("\"expect_timeout_ms\": 9000"))
        .stdout(predicate::str::contains("\"concurrency\": 3"));
}

#[test]
fn test_config_bad_env() {
    ensayador()
        .env("ENSAYO_HEADLESS", "sometimes")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ENSAYO_HEADLESS"));
}

// ============================================================================
// Run (argument handling only)
// ============================================================================

#[test]
fn test_run_invalid_scenario_fails_before_launch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(&path, "steps: [").unwrap();

    ensayador()
        .arg("run")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
