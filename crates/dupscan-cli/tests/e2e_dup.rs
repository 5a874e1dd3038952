//! E2E CLI workflow: init -> add -> list -> dup -> delete.
//!
//! Each test runs the `dupscan` binary as a subprocess in an isolated temp
//! directory with the default offline hashing embedder.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn dupscan_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dupscan"));
    cmd.current_dir(dir);
    cmd.env("DUPSCAN_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project(dir: &Path) {
    dupscan_cmd(dir).args(["init"]).assert().success();
}

fn add_doc(dir: &Path, category: &str, content_type: &str, content: &str) -> String {
    let output = dupscan_cmd(dir)
        .args([
            "add",
            "--category",
            category,
            "--type",
            content_type,
            "--content",
            content,
            "--json",
        ])
        .output()
        .expect("add should not crash");
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: Value = serde_json::from_slice(&output.stdout).expect("add --json should be JSON");
    json["id"].as_str().expect("add output has 'id'").to_string()
}

fn dup_json(dir: &Path, category: &str, content_type: &str, content: &str) -> Value {
    let output = dupscan_cmd(dir)
        .args([
            "dup",
            "--category",
            category,
            "--type",
            content_type,
            "--content",
            content,
            "--json",
        ])
        .output()
        .expect("dup should not crash");
    assert!(
        output.status.success(),
        "dup failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("dup --json should be JSON")
}

const FAQ: &str = "# Exporting reports

Open **Reports** and pick the *date range* you need.

- Choose CSV or PDF
- Press export

Large exports are emailed when they finish.";

const OTHER: &str = "# Inviting teammates

Admins can invite people from the **Members** page.

Invitations expire after seven days.";

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn init_twice_without_force_fails() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    dupscan_cmd(dir.path())
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    dupscan_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn resubmitted_document_is_flagged_as_duplicate() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let faq = add_doc(dir.path(), "help", "markdown", FAQ);
    add_doc(dir.path(), "help", "markdown", OTHER);

    let json = dup_json(dir.path(), "help", "markdown", FAQ);
    assert_eq!(json["timed_out"], false);
    assert_eq!(json["failed_queries"], 0);

    let top = &json["candidates"][0];
    assert_eq!(top["doc_id"], faq.as_str());
    let score = top["score"].as_f64().expect("score is a number");
    assert!((score - 1.0).abs() < 1e-3, "self overlap was {score}");
    assert_eq!(top["risk"], "likely_duplicate");
    assert_eq!(top["preview"], "# Exporting reports");
    assert!(json.get("unevaluated").is_none());
}

#[test]
fn dup_in_other_category_finds_nothing() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    add_doc(dir.path(), "help", "markdown", FAQ);

    let json = dup_json(dir.path(), "billing", "markdown", FAQ);
    assert_eq!(json["count"], 0);
    assert!(json["candidates"].as_array().expect("array").is_empty());
}

#[test]
fn list_and_delete_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let id = add_doc(dir.path(), "help", "text", "Paragraph one.\n\nParagraph two.");

    let output = dupscan_cmd(dir.path())
        .args(["list", "--json"])
        .output()
        .expect("list");
    let docs: Value = serde_json::from_slice(&output.stdout).expect("list JSON");
    assert_eq!(docs.as_array().map(Vec::len), Some(1));
    assert_eq!(docs[0]["id"], id.as_str());
    assert_eq!(docs[0]["chunk_count"], 2);
    assert_eq!(docs[0]["content"], "Paragraph one.\n\nParagraph two.");

    dupscan_cmd(dir.path())
        .args(["delete", &id, "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted 1"));

    let output = dupscan_cmd(dir.path())
        .args(["list", "--json"])
        .output()
        .expect("list");
    let docs: Value = serde_json::from_slice(&output.stdout).expect("list JSON");
    assert_eq!(docs.as_array().map(Vec::len), Some(0));
}

#[test]
fn dup_without_init_reports_structured_error() {
    let dir = TempDir::new().expect("tempdir");
    let output = dupscan_cmd(dir.path())
        .args(["dup", "--category", "help", "--content", "hello", "--json"])
        .output()
        .expect("dup");
    assert!(!output.status.success());

    let err: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(err["error"]["error_code"], "E1001");
    assert!(err["error"]["suggestion"].as_str().is_some());
}

#[test]
fn unsupported_content_type_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let output = dupscan_cmd(dir.path())
        .args([
            "dup", "--category", "help", "--type", "pdf", "--content", "hello", "--json",
        ])
        .output()
        .expect("dup");
    assert!(!output.status.success());

    let err: Value = serde_json::from_slice(&output.stderr).expect("error JSON on stderr");
    assert_eq!(err["error"]["error_code"], "E2001");
}

#[test]
fn zero_top_k_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    dupscan_cmd(dir.path())
        .args([
            "dup", "--category", "help", "--content", "hello", "--top-k", "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2002"));
}

#[test]
fn blank_document_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    dupscan_cmd(dir.path())
        .args(["add", "--category", "help", "--content", "   ", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3002"));
}

#[test]
fn chunks_lists_heading_first() {
    let dir = TempDir::new().expect("tempdir");
    let output = dupscan_cmd(dir.path())
        .args(["chunks", "--type", "markdown", "--content", FAQ, "--json"])
        .output()
        .expect("chunks");
    assert!(output.status.success());

    let chunks: Value = serde_json::from_slice(&output.stdout).expect("chunks JSON");
    assert_eq!(chunks[0]["position"], 0);
    assert!(
        chunks[0]["text"]
            .as_str()
            .is_some_and(|t| t.starts_with("# Exporting"))
    );
}
