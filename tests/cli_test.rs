use assert_cmd::Command;
use predicates::prelude::*;

fn netpeek() -> Command {
    Command::cargo_bin("netpeek").expect("binary builds")
}

#[test]
fn test_help_lists_flags() {
    netpeek()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--watch"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--proto"))
        .stdout(predicate::str::contains("--sort"));
}

#[test]
fn test_json_output_is_an_array() {
    let output = netpeek().args(["--json"]).output().expect("runs");
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is valid JSON");
    assert!(value.is_array());
}

#[test]
fn test_table_output_has_header() {
    netpeek()
        .args(["-n", "-P"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PROTO"))
        .stdout(predicate::str::contains("LOCAL"))
        .stdout(predicate::str::contains("PROCESS"));
}

#[test]
fn test_listening_filter_in_json() {
    let output = netpeek().args(["--json", "-l"]).output().expect("runs");
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    for conn in value.as_array().unwrap() {
        assert_eq!(conn["state"], "LISTEN");
    }
}

#[test]
fn test_unknown_sort_key_fails() {
    netpeek()
        .args(["--sort", "inode"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown sort key"));
}

#[test]
fn test_unknown_protocol_fails() {
    netpeek()
        .args(["--proto", "sctp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown protocol"));
}
