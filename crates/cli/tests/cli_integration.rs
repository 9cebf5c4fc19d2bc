//! CLI integration tests for all subcommands.
//!
//! Uses `assert_cmd` to spawn the `compass` binary and verify
//! exit codes, stdout content, and stderr content.
//!
//! All tests set `current_dir` to the workspace root so that relative
//! paths to fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `compass` binary, rooted at workspace.
fn compass() -> Command {
    let mut cmd = cargo_bin_cmd!("compass");
    cmd.current_dir(workspace_root());
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    compass()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Construction document interpreter"));
}

#[test]
fn version_exits_0() {
    compass()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("compass"));
}

// ──────────────────────────────────────────────
// 2. Parse subcommand
// ──────────────────────────────────────────────

#[test]
fn parse_prints_point_valued_expressions() {
    compass()
        .args(["parse", "(A + B) / 2", "--object", "A", "--object", "B"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[((($A.X() + $B.X())) / 2), ((($A.Y() + $B.Y())) / 2)]",
        ));
}

#[test]
fn parse_function_definition_lists_parameters() {
    compass()
        .args(["parse", "f(x) = r*x^2", "--object", "r:value"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("(x) => "))
        .stdout(predicate::str::contains("$r.Value()"));
}

#[test]
fn parse_json_reports_unresolved_names() {
    let out = compass()
        .args(["--output", "json", "parse", "Q + 1"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["outcome"]["result"]["status"], "value");
    assert_eq!(json["diagnostics"][0]["kind"], "unresolved_name");
    assert_eq!(json["references"][0], "Q");
}

#[test]
fn parse_rejects_bad_object_declarations() {
    compass()
        .args(["parse", "A", "--object", "A:volume"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown capability"));
}

// ──────────────────────────────────────────────
// 3. Eval subcommand
// ──────────────────────────────────────────────

#[test]
fn eval_closed_arithmetic() {
    compass()
        .args(["eval", "1 + 2 * 3"])
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn eval_json_output() {
    let out = compass()
        .args(["--output", "json", "eval", "pow(2, 10)"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["value"], 1024.0);
}

#[test]
fn eval_with_scene_names_exits_1() {
    compass()
        .args(["eval", "A + 1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("needs a scene"));
}

// ──────────────────────────────────────────────
// 4. Validate subcommand
// ──────────────────────────────────────────────

#[test]
fn validate_fixture_exits_0() {
    compass()
        .args(["validate", "fixtures/midpoint.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn validate_unknown_field_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.json");
    fs::write(
        &path,
        r#"{ "elements": [ { "id": "A", "kind": "point", "colour": "red" } ] }"#,
    )
    .unwrap();
    compass()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid document"));
}

#[test]
fn validate_duplicate_outputs_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dup.json");
    fs::write(
        &path,
        r#"{
  "commands": [
    { "name": "Midpoint", "inputs": ["A", "B"], "outputs": ["M"] },
    { "name": "Midpoint", "inputs": ["B", "C"], "outputs": ["M"] }
  ]
}"#,
    )
    .unwrap();
    compass()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than one command"));
}

#[test]
fn validate_nonexistent_file_exits_1() {
    compass()
        .args(["validate", "nonexistent_file_xyz.json"])
        .assert()
        .failure()
        .code(1);
}

// ──────────────────────────────────────────────
// 5. Build subcommand
// ──────────────────────────────────────────────

#[test]
fn build_midpoint_fixture() {
    compass()
        .args(["build", "fixtures/midpoint.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("M (point) midpoint #2 at (2, 3)"))
        .stdout(predicate::str::contains("0 diagnostics"));
}

#[test]
fn build_json_lists_objects_and_measurements() {
    let out = compass()
        .args(["--output", "json", "build", "fixtures/polygon.json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let objects = json["objects"].as_array().unwrap();
    let poly = objects.iter().find(|o| o["name"] == "poly").unwrap();
    assert_eq!(poly["binding"], "object");
    assert_eq!(poly["measurements"]["area"], 12.0);
    let area = objects.iter().find(|o| o["name"] == "area").unwrap();
    assert_eq!(area["binding"], "value");
    assert!(json["diagnostics"].as_array().unwrap().is_empty());
}

#[test]
fn build_reports_diagnostics_but_succeeds() {
    compass()
        .args(["build", "fixtures/broken.json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("unknown construction type 'hyperboloid'"))
        .stdout(predicate::str::contains("N (midpoint)"));
}

#[test]
fn build_strict_fails_on_diagnostics() {
    compass()
        .args(["build", "--strict", "fixtures/cycle.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("reference cycle a -> b -> a"));
}

#[test]
fn build_decimals_override() {
    compass()
        .args(["build", "--decimals", "3", "fixtures/function.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("text \"18.000\""));
}

#[test]
fn build_invalid_json_exits_1() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    compass()
        .args(["build", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid construction document"));
}
