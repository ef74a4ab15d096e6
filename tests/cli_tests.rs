//! Command-line tests
//!
//! Runs the built binary against the embedded demo catalog and scripted stdin.

use assert_cmd::Command;
use predicates::prelude::*;

fn key_solver() -> Command {
    Command::cargo_bin("key-solver").unwrap()
}

#[test]
fn test_multi_identifies_specimen() {
    key_solver()
        .args(["multi", "demo-eucalypts"])
        .write_stdin("2\n1\n1\n1\n1\n2\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Eucalypts of the demonstration garden"))
        .stdout(predicate::str::contains("IDENTIFIED: Eucalyptus camaldulensis"))
        .stdout(predicate::str::contains(
            "More information: https://vicflora.rbg.vic.gov.au/flora/taxon/eucalyptus-camaldulensis",
        ));
}

#[test]
fn test_multi_json_output() {
    let output = key_solver()
        .args(["multi", "--format", "json"])
        .write_stdin("4\n55\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["key"]["id"], "demo-eucalypts");
    assert_eq!(json["outcome"]["status"], "identified");
    assert_eq!(json["outcome"]["taxon"]["name"], "Eucalyptus viridis");
    assert_eq!(json["selections"][0]["value"], "55");

    // The interactive transcript goes to stderr so stdout stays parseable
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Selected: Adult leaf length (mm) = 55"));
}

#[test]
fn test_multi_unknown_key() {
    key_solver()
        .args(["multi", "no-such-key"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-key"));
}

#[test]
fn test_multi_rejects_bad_key_id() {
    key_solver()
        .args(["multi", "../etc/passwd"])
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn test_dichotomous_follows_linked_key() {
    key_solver()
        .args(["dichotomous", "--start", "1903"])
        .write_stdin("1\n2\n1\n\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Starting dichotomous key navigation from key 1903.",
        ))
        .stdout(predicate::str::contains("Leads to key 42"))
        .stdout(predicate::str::contains("Result: Melaleuca"));
}

#[test]
fn test_dichotomous_json_summary() {
    let output = key_solver()
        .args(["dichotomous", "--format", "json"])
        .write_stdin("2\n1\nq\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["results"][0]["name"], "Asteraceae");
    assert_eq!(json["trail"], serde_json::json!(["1903"]));
}

#[test]
fn test_dichotomous_unknown_start_key() {
    key_solver()
        .args(["dichotomous", "--start", "999"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("999"));
}

#[test]
fn test_catalog_list() {
    key_solver()
        .args(["catalog", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-access keys (1)"))
        .stdout(predicate::str::contains("Dichotomous keys (2)"))
        .stdout(predicate::str::contains("demo-eucalypts"))
        .stdout(predicate::str::contains("1903"));
}

#[test]
fn test_catalog_list_json() {
    let output = key_solver()
        .args(["catalog", "list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["multi_access"].as_array().unwrap().len(), 1);
    assert_eq!(json["dichotomous"].as_array().unwrap().len(), 2);
    assert_eq!(json["dichotomous"][0]["id"], "1903");
}

#[test]
fn test_catalog_show() {
    key_solver()
        .args(["catalog", "show", "demo-eucalypts", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Multi-access key:"))
        .stdout(predicate::str::contains("[numeric]"))
        .stdout(predicate::str::contains("Eucalyptus leucoxylon"));

    key_solver()
        .args(["catalog", "show", "1903"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dichotomous key: Key to selected families"))
        .stdout(predicate::str::contains("42: Key to genera of Myrtaceae"));

    key_solver()
        .args(["catalog", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_catalog_analyze_json() {
    let output = key_solver()
        .args(["catalog", "analyze", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let analysis = &json[0];
    assert_eq!(analysis["entities"], 6);
    assert_eq!(analysis["features"], 5);
    assert_eq!(analysis["measured_characters"], 1);
}

#[test]
fn test_catalog_export_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle.json");

    key_solver()
        .args(["catalog", "export"])
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 keys"));

    key_solver()
        .args(["catalog", "list", "--catalog"])
        .arg(&bundle)
        .assert()
        .success()
        .stdout(predicate::str::contains("demo-eucalypts"));
}

#[test]
fn test_missing_catalog_path() {
    key_solver()
        .args(["catalog", "list", "--catalog", "/nonexistent/keys.json"])
        .assert()
        .failure();
}
