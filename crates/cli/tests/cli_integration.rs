//! CLI integration tests for the `duplex` binary.
//!
//! Uses `assert_cmd` to spawn the binary and verify exit codes, stdout
//! content and stderr content. All tests set `current_dir` to the
//! workspace root so that relative paths to fixtures resolve correctly.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `duplex` binary, rooted at the
/// workspace.
fn duplex() -> Command {
    let mut cmd = cargo_bin_cmd!("duplex");
    cmd.current_dir(workspace_root());
    cmd
}

#[test]
fn help_exits_0_with_description() {
    duplex()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Two-party workflow protocol verifier",
        ));
}

#[test]
fn version_exits_0() {
    duplex()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("duplex"));
}

#[test]
fn analyze_valid_protocol_exits_0() {
    duplex()
        .args(["analyze", "fixtures/two_party_trade.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow trade.Initiator"))
        .stdout(predicate::str::contains("protocol: valid"))
        .stdout(predicate::str::contains("summary: 1 initiator(s), 1 valid, 0 invalid"));
}

#[test]
fn analyze_prints_links_between_matched_lines() {
    duplex()
        .args(["analyze", "fixtures/two_party_trade.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "counterparty.send(TradeProposal)  <->",
        ));
}

#[test]
fn analyze_invalid_protocol_exits_1() {
    duplex()
        .args(["analyze", "fixtures/type_mismatch.json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("protocol: invalid"))
        .stdout(predicate::str::contains("[warning]"));
}

#[test]
fn analyze_json_output_is_machine_readable() {
    let assert = duplex()
        .args(["analyze", "fixtures/two_party_trade.json", "--output", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 stdout");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON report");
    assert_eq!(
        value["workflows"]["trade.Initiator"]["outcome"]["status"],
        "valid"
    );
    assert_eq!(
        value["workflows"]["trade.Initiator"]["combination_count"],
        2
    );
}

#[test]
fn analyze_missing_file_exits_2() {
    duplex()
        .args(["analyze", "fixtures/does_not_exist.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn analyze_cyclic_calls_exit_2() {
    duplex()
        .args(["analyze", "fixtures/cyclic_calls.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cyclic sub-workflow graph"));
}

#[test]
fn analyze_malformed_json_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    let mut file = std::fs::File::create(&path).expect("create file");
    writeln!(file, "{{ not json").expect("write file");

    duplex()
        .args(["analyze", path.to_str().expect("utf-8 path")])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn analyze_malformed_statement_exits_2() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad_stmt.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [{
                "id": "bad",
                "body": [{"stmt": "teleport", "line": 1}]
            }]
        })
        .to_string(),
    )
    .expect("write file");

    duplex()
        .args(["analyze", path.to_str().expect("utf-8 path")])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bad"));
}

#[test]
fn paths_lists_expanded_combinations() {
    duplex()
        .args([
            "paths",
            "fixtures/loop_exchange.json",
            "--workflow",
            "batch.Initiator",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow batch.Initiator: 2 path(s)"))
        .stdout(predicate::str::contains("sink.send(EndOfBatch)"))
        .stdout(predicate::str::contains("sink.send(Item)"));
}

#[test]
fn paths_json_output_carries_every_path() {
    let assert = duplex()
        .args([
            "paths",
            "fixtures/loop_exchange.json",
            "--workflow",
            "batch.Initiator",
            "--output",
            "json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf-8 stdout");
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON paths");
    assert_eq!(value["combination_count"], 2);
    assert_eq!(value["paths"].as_array().expect("paths array").len(), 2);
}

#[test]
fn paths_unknown_workflow_exits_2() {
    duplex()
        .args([
            "paths",
            "fixtures/loop_exchange.json",
            "--workflow",
            "ghost.Workflow",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ghost.Workflow"));
}
