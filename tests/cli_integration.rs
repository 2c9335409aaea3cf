//! Integration tests for the Conductor CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command for the conductor binary, pinned to the simulated backend
fn conductor(project: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("conductor"));
    cmd.env("CONDUCTOR_BACKEND", "simulated")
        .env("NO_COLOR", "1")
        .arg("--project")
        .arg(project.path());
    cmd
}

#[test]
fn test_help() {
    Command::new(cargo::cargo_bin!("conductor"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Delegate coding tasks"));
}

#[test]
fn test_version() {
    Command::new(cargo::cargo_bin!("conductor"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_project_fails() {
    Command::new(cargo::cargo_bin!("conductor"))
        .arg("--project")
        .arg("/nonexistent/conductor/project")
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_analyze_json() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args(["analyze", "Create a login form component with validation", "--type", "ui", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"ui\""))
        .stdout(predicate::str::contains("validation"));
}

#[test]
fn test_analyze_rejects_blank_description() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args(["analyze", "   "])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_analyze_rejects_unknown_complexity() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args(["analyze", "Build a chart", "--complexity", "extreme"])
        .assert()
        .failure();
}

#[test]
fn test_templates_list_and_show() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args(["templates", "list", "--tool", "claude"])
        .assert()
        .success()
        .stdout(predicate::str::contains("component"))
        .stdout(predicate::str::contains("ui-specialist").not());

    conductor(&temp)
        .args(["templates", "show", "claude", "component"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task: {description}"));

    conductor(&temp)
        .args(["templates", "show", "claude", "missing"])
        .assert()
        .failure();
}

#[test]
fn test_config_show_and_validate() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"backend\": \"simulated\""));

    conductor(&temp)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_invalid_settings_exit_code() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join(".conductor")).unwrap();
    fs::write(temp.path().join(".conductor/settings.json"), "{ not json").unwrap();

    conductor(&temp).args(["config", "validate"]).assert().failure();
}

#[test]
fn test_run_persists_usage() {
    let temp = TempDir::new().unwrap();

    conductor(&temp)
        .args([
            "run",
            "Create a login form component with validation",
            "--id",
            "t1",
            "--type",
            "ui",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"completed\""));

    assert!(temp.path().join(".conductor/token_usage.json").exists());
    assert!(temp.path().join(".conductor/metrics.json").exists());

    conductor(&temp)
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completedTasks\": 1"));

    conductor(&temp)
        .args(["report", "--format", "markdown"])
        .assert()
        .success()
        .stdout(predicate::str::contains("| Tasks | 1 |"));
}

#[test]
fn test_quality_scores_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("LoginForm.tsx");
    fs::write(&file, conductor::testing::LOGIN_FORM_IMPLEMENTATION).unwrap();

    conductor(&temp)
        .arg("quality")
        .arg(&file)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("overallScore"));
}

#[test]
fn test_compare_requires_pairs() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.tsx");
    let b = temp.path().join("b.tsx");
    fs::write(&a, conductor::testing::LOGIN_FORM_IMPLEMENTATION).unwrap();
    fs::write(&b, conductor::testing::BARE_IMPLEMENTATION).unwrap();

    conductor(&temp)
        .arg("compare")
        .arg(format!("claude={}", a.display()))
        .arg(format!("ui-specialist={}", b.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Best tool: claude"));

    conductor(&temp)
        .args(["compare", "no-separator"])
        .assert()
        .code(2);
}
