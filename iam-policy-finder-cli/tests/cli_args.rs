use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn finder() -> Command {
    Command::cargo_bin("iam-policy-finder").expect("binary should be built")
}

#[test]
fn help_lists_positional_arguments_and_flags() {
    finder()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<ACTION>"))
        .stdout(predicate::str::contains("<RESOURCE>"))
        .stdout(predicate::str::contains("--mode"))
        .stdout(predicate::str::contains("--all-versions"))
        .stdout(predicate::str::contains("--fail-fast"));
}

#[test]
fn version_flag_prints_version() {
    finder()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_resource_is_a_usage_error() {
    let output = finder()
        .arg("s3:GetObject")
        .output()
        .expect("failed to run with one argument");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<RESOURCE>"), "stderr was: {}", stderr);
}

#[test]
fn no_arguments_is_a_usage_error() {
    finder().assert().code(2);
}

#[test]
fn unknown_mode_is_rejected() {
    finder()
        .args([
            "s3:GetObject",
            "arn:aws:s3:::bucket/key",
            "--mode",
            "actions",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("resource"));
}

#[test]
fn unknown_scope_is_rejected() {
    finder()
        .args([
            "s3:GetObject",
            "arn:aws:s3:::bucket/key",
            "--scope",
            "everything",
        ])
        .assert()
        .code(2);
}

#[test]
fn zero_channel_capacity_is_rejected() {
    finder()
        .args([
            "s3:GetObject",
            "arn:aws:s3:::bucket/key",
            "--channel-capacity",
            "0",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least 1"));
}
