//! Smoke tests for the pageflow CLI
//!
//! These tests run the real binary against the mock driver.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the pageflow binary with a clean environment
fn pageflow() -> Command {
    let mut cmd = Command::cargo_bin("pageflow").expect("pageflow binary should exist");
    for key in [
        "CI",
        "RUST_LOG",
        "PAGEFLOW_BASE_URL",
        "PAGEFLOW_TIMEOUT_MS",
        "PAGEFLOW_WORKERS",
        "PAGEFLOW_RETRIES",
        "PAGEFLOW_HEADLESS",
        "PAGEFLOW_BACKEND_URL",
        "PAGEFLOW_UPDATE_SNAPSHOTS",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    pageflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    pageflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("test"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_no_args_shows_help() {
    pageflow().assert().failure();
}

#[test]
fn test_test_subcommand_help() {
    pageflow()
        .args(["test", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--driver"));
}

// ============================================================================
// List
// ============================================================================

#[test]
fn test_list_all() {
    pageflow()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("01-basic::should add a new todo"))
        .stdout(predicate::str::contains("02-advanced::should handle special characters"));
}

#[test]
fn test_list_by_tag() {
    let output = pageflow().args(["list", "--tag", "edge"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.lines().all(|l| l.starts_with("02-advanced::")));
}

#[test]
fn test_list_json() {
    let output = pageflow().args(["list", "--json", "--suite", "01-basic"]).output().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_defaults() {
    pageflow()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url: http://localhost:3000"))
        .stdout(predicate::str::contains("seed: static"));
}

#[test]
fn test_config_flag_and_env_layers() {
    pageflow()
        .args(["config", "--workers", "3"])
        .env("PAGEFLOW_RETRIES", "4")
        .assert()
        .success()
        .stdout(predicate::str::contains("workers: 3"))
        .stdout(predicate::str::contains("retries: 4"));
}

#[test]
fn test_config_ci_defaults() {
    pageflow()
        .args(["config", "--json"])
        .env("CI", "true")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"retries\": 2"))
        .stdout(predicate::str::contains("\"workers\": 1"));
}

#[test]
fn test_config_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pageflow.json");
    fs::write(&path, r#"{"baseURL": "http://staging:8080", "timeout": 2500}"#).unwrap();
    pageflow()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://staging:8080"))
        .stdout(predicate::str::contains("timeout_ms: 2500"));
}

#[test]
fn test_config_rejects_bad_base_url() {
    pageflow()
        .args(["config", "--base-url", "localhost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("base_url"));
}

// ============================================================================
// Test
// ============================================================================

#[test]
fn test_run_all_suites_on_mock() {
    let temp = TempDir::new().unwrap();
    pageflow()
        .args(["-q", "test", "--timeout", "500", "-j", "2", "--output"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("10 scenarios: 10 passed, 0 failed"));

    assert!(temp.path().join("report.json").exists());
    let junit = fs::read_to_string(temp.path().join("junit.xml")).unwrap();
    assert!(junit.contains("02-advanced"));
}

#[test]
fn test_run_json_format() {
    let temp = TempDir::new().unwrap();
    let output = pageflow()
        .args(["-q", "test", "--tag", "smoke", "--format", "json", "--output"])
        .arg(temp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let scenarios = json["scenarios"].as_array().unwrap();
    assert_eq!(scenarios.len(), 3);
    assert!(scenarios.iter().all(|s| s["outcome"] == "passed"));
}

#[test]
fn test_run_service_seed_without_backend() {
    let temp = TempDir::new().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    pageflow()
        .args(["-q", "test", "--seed", "service", "--backend-url"])
        .arg(format!("http://127.0.0.1:{port}"))
        .arg("--output")
        .arg(temp.path())
        .assert()
        .success();
}

#[test]
fn test_items_flag_belongs_to_serve() {
    pageflow()
        .args(["test", "--items", "items.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--items"));
}

#[test]
fn test_visual_mismatch_then_update() {
    let temp = TempDir::new().unwrap();
    let visual = ["-q", "test", "--suite", "03-visual", "--output"];
    pageflow().args(visual).arg(temp.path()).assert().success();

    let baseline = temp.path().join("snapshots").join("completed-todo-item.txt");
    assert!(baseline.exists());
    fs::write(&baseline, "stale baseline").unwrap();

    pageflow()
        .args(visual)
        .arg(temp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("completed-todo-item differs from baseline"));

    pageflow()
        .args(visual)
        .arg(temp.path())
        .arg("--update-snapshots")
        .assert()
        .success();
    pageflow().args(visual).arg(temp.path()).assert().success();
}

#[test]
fn test_run_no_match_is_empty_success() {
    let temp = TempDir::new().unwrap();
    pageflow()
        .args(["-q", "test", "--grep", "nothing matches this", "--output"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 scenarios"));
}

#[cfg(not(feature = "browser"))]
#[test]
fn test_chromium_without_feature_fails() {
    let temp = TempDir::new().unwrap();
    pageflow()
        .args(["test", "--driver", "chromium", "--output"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--features browser"));
}

#[test]
fn test_invalid_seed_rejected() {
    pageflow()
        .args(["test", "--seed", "merged"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("merged"));
}
