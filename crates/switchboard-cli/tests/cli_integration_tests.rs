//! CLI integration tests for switchboard
//!
//! Tests the switchboard CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const WORKERS: &str = r#"[
  {
    "id": "acme/large",
    "provider": "acme",
    "capabilities": ["streaming", "tool_use"],
    "certifications": ["hipaa", "soc2"],
    "quality_score": 92.0,
    "input_cost_per_million": 10.0,
    "output_cost_per_million": 30.0,
    "latency_ms": 900,
    "uptime_percent": 99.9,
    "error_rate": 0.002
  },
  {
    "id": "acme/small",
    "provider": "acme",
    "capabilities": ["streaming", "tool_use"],
    "quality_score": 72.0,
    "input_cost_per_million": 0.2,
    "output_cost_per_million": 0.6,
    "latency_ms": 250,
    "uptime_percent": 99.5,
    "error_rate": 0.01
  },
  {
    "id": "zeta/vision",
    "provider": "zeta",
    "capabilities": ["streaming", "vision"],
    "certifications": ["hipaa"],
    "quality_score": 85.0,
    "input_cost_per_million": 3.0,
    "output_cost_per_million": 15.0,
    "latency_ms": 600,
    "uptime_percent": 99.0,
    "error_rate": 0.02
  }
]"#;

/// Command isolated to its own config directory
#[allow(deprecated)]
fn switchboard_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("switchboard").unwrap();
    cmd.env("SWITCHBOARD_CONFIG_DIR", config_dir.path());
    cmd.env("RUST_LOG", "off");
    cmd
}

fn workers_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("workers.json");
    std::fs::write(&path, WORKERS).unwrap();
    path
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("select"))
        .stdout(predicate::str::contains("profiles"));
}

#[test]
fn test_select_text_output() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);

    switchboard_cmd(&dir)
        .args(["select", "--workers"])
        .arg(&workers)
        .assert()
        .success()
        .stdout(predicate::str::contains("Primary:"))
        .stdout(predicate::str::contains("Eligible:  3 of 3"))
        .stdout(predicate::str::contains("Scores:"));
}

#[test]
fn test_select_healthcare_json() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);

    let output = switchboard_cmd(&dir)
        .args(["select", "--format", "json", "--domain", "healthcare", "--workers"])
        .arg(&workers)
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["profile"]["id"], "healthcare");
    assert_eq!(result["metadata"]["candidates_eligible"], 2);
    // Both certified workers pass the floor; the cheaper one wins on cost
    assert_eq!(result["primary"], "zeta/vision");
    assert_eq!(result["fallbacks"], serde_json::json!(["acme/large"]));
}

#[test]
fn test_select_capability_filter_quiet() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);

    switchboard_cmd(&dir)
        .args(["select", "--quiet", "--capability", "vision", "--workers"])
        .arg(&workers)
        .assert()
        .success()
        .stdout(predicate::str::diff("zeta/vision\n"));
}

#[test]
fn test_select_request_file() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);
    let request = dir.path().join("request.json");
    std::fs::write(&request, r#"{"optimization": "cost"}"#).unwrap();

    switchboard_cmd(&dir)
        .args(["select", "--quiet", "--workers"])
        .arg(&workers)
        .arg("--request")
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::diff("acme/small\n"));
}

#[test]
fn test_select_no_eligible_worker() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);

    switchboard_cmd(&dir)
        .args(["select", "--capability", "audio", "--workers"])
        .arg(&workers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E001"))
        .stderr(predicate::str::contains("capability"));
}

#[test]
fn test_select_unknown_profile() {
    let dir = TempDir::new().unwrap();
    let workers = workers_file(&dir);

    switchboard_cmd(&dir)
        .args(["select", "--profile", "nonexistent", "--workers"])
        .arg(&workers)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E100"));
}

#[test]
fn test_profiles_list() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args(["profiles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("healthcare"))
        .stdout(predicate::str::contains("general"))
        .stdout(predicate::str::contains("(default)"));
}

#[test]
fn test_profiles_show() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args(["profiles", "show", "healthcare"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Minimum quality: 80"))
        .stdout(predicate::str::contains("HIPAA"));
}

#[test]
fn test_profiles_show_unknown() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args(["profiles", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_classify() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args([
            "classify",
            "Review this contract clause for liability and litigation risk",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Domain: legal"));
}

#[test]
fn test_classify_task_type_json() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args(["classify", "anything", "--task-type", "code_review", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"coding\""));
}

#[test]
fn test_config_set_get_reset() {
    let dir = TempDir::new().unwrap();

    switchboard_cmd(&dir)
        .args(["config", "set", "engine.fallback_count", "5"])
        .assert()
        .success();

    switchboard_cmd(&dir)
        .args(["config", "get", "engine.fallback_count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5\n"));

    switchboard_cmd(&dir)
        .args(["config", "reset"])
        .assert()
        .success();

    switchboard_cmd(&dir)
        .args(["config", "get", "engine.fallback_count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn test_config_unknown_key() {
    let dir = TempDir::new().unwrap();
    switchboard_cmd(&dir)
        .args(["config", "get", "engine.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}
