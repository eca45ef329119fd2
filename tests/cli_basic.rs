//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, and each subcommand
//! responds to `--help` with appropriate text.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `reelcast` binary.
fn reelcast() -> Command {
    Command::cargo_bin("reelcast").expect("binary 'reelcast' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    reelcast()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: reelcast"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("once"))
        .stdout(predicate::str::contains("render"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn version_flag_shows_semver() {
    reelcast()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^reelcast \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_subcommand_is_usage_error() {
    reelcast()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: reelcast"));
}

#[test]
fn unknown_subcommand_fails() {
    reelcast()
        .arg("publish-everything")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn render_help_lists_options() {
    reelcast()
        .args(["render", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--photo"))
        .stdout(predicate::str::contains("--title"))
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn render_requires_title() {
    reelcast()
        .arg("render")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--title"));
}

#[test]
fn global_config_flag_accepted_after_subcommand() {
    reelcast()
        .args(["once", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"));
}
