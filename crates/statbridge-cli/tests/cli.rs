//! End-to-end tests for the statbridge CLI.
//!
//! None of these reach the interpreter: they cover the registry commands
//! and the failure paths that are resolved before the runtime starts.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Temp dir with an empty runtime config so the user's config is never read.
struct Workspace {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{}").expect("Failed to write config");
        Self {
            temp_dir,
            config_path,
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("Failed to write file");
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("statbridge").unwrap();
        cmd.arg("--config").arg(&self.config_path);
        cmd.env("STATBRIDGE_PYTHON", self.temp_dir.path().join("no-python"));
        cmd
    }
}

// =============================================================================
// Registry commands
// =============================================================================

#[test]
fn test_methods_filtered_by_worker() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["methods", "--worker", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kmeans_clustering"))
        .stdout(predicate::str::contains("dataMatrix: numberMatrix"))
        .stdout(predicate::str::contains("one_way_anova").not());
}

#[test]
fn test_methods_json() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["methods", "--json"]).output().unwrap();
    assert!(output.status.success());

    let methods: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let methods = methods.as_array().unwrap();
    assert_eq!(methods.len(), 44);
    assert_eq!(methods[0]["methodId"], "descriptive_stats");
}

#[test]
fn test_methods_unknown_worker() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["methods", "--worker", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No worker 9"));
}

#[test]
fn test_generate_to_file() {
    let ws = Workspace::new();
    let out = ws.temp_dir.path().join("methods.rs");

    ws.cmd()
        .args(["generate", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated 44 wrappers across 4 workers"));

    let source = fs::read_to_string(&out).unwrap();
    assert!(source.starts_with("// @generated"));
    assert!(source.contains("pub enum MethodId"));
    assert!(source.contains("pub async fn welch_anova"));
}

#[test]
fn test_generate_rejects_colliding_registry() {
    let ws = Workspace::new();
    let registry = ws.write(
        "registry.json",
        r#"{
            "workers": [{ "id": 1 }],
            "methods": [
                { "methodId": "t_test", "workerId": 1, "params": ["data"], "returns": ["pValue"] },
                { "methodId": "t-test", "workerId": 1, "params": ["data"], "returns": ["pValue"] }
            ]
        }"#,
    );

    ws.cmd()
        .args(["generate", "--registry"])
        .arg(&registry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("both map to the generated name `t_test`"));
}

#[test]
fn test_generate_rejects_uninferable_name() {
    let ws = Workspace::new();
    let registry = ws.write(
        "registry.json",
        r#"{
            "workers": [{ "id": 1 }],
            "methods": [{ "methodId": "m", "workerId": 1, "params": ["mystery"], "returns": [] }]
        }"#,
    );

    ws.cmd()
        .args(["generate", "--registry"])
        .arg(&registry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("annotate it as 'mystery: <kind>'"));
}

// =============================================================================
// Failures resolved before the runtime starts
// =============================================================================

#[test]
fn test_call_rejects_bad_argument() {
    let ws = Workspace::new();
    ws.cmd()
        .args([
            "call",
            "one_sample_t_test",
            "--args",
            r#"{"data": [1, "2"], "popmean": 0}"#,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value for parameter 'data'"))
        .stderr(predicate::str::contains("hint: run `statbridge methods`"));
}

#[test]
fn test_call_unknown_method() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["call", "astrology"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown method: astrology"));
}

#[test]
fn test_analyze_insufficient_data() {
    let ws = Workspace::new();
    let rows = ws.write(
        "rows.json",
        r#"[{"v": 1, "g": "a"}, {"v": 2, "g": "a"}, {"v": null, "g": "b"}]"#,
    );

    ws.cmd()
        .args(["analyze", "one_way_anova", "--rows"])
        .arg(&rows)
        .args(["--map", "value=v", "--map", "group=g"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("`one_way_anova` failed: insufficient data"));
}

#[test]
fn test_analyze_report_mode() {
    let ws = Workspace::new();
    let rows = ws.write("rows.json", r#"[{"v": 1}]"#);

    let output = ws
        .cmd()
        .args(["analyze", "pearson_correlation", "--report", "--rows"])
        .arg(&rows)
        .args(["--map", "x=v"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["metadata"]["succeeded"], false);
    assert_eq!(
        result["mainResults"]["interpretation"],
        "`pearson_correlation` failed: no column mapped to role 'y'"
    );
}
