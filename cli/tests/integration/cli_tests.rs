//! Argument parsing, help and version output.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn agenthost() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("agenthost"));
    cmd.env("NO_COLOR", "1")
        .env_remove("AGENTHOST_CONFIG")
        .env_remove("AGENTHOST_STATE");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    agenthost().assert().code(2).stderr(predicate::str::contains(
        "Provision and bootstrap a single-host AI agent gateway",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    let assert = agenthost().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for command in ["preview", "up", "outputs", "env", "render-bootstrap", "inventory", "version"] {
        assert!(stdout.contains(command), "help should list {command}:\n{stdout}");
    }
}

#[test]
fn test_cli_help_hides_first_boot() {
    agenthost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("_first-boot").not());
}

#[test]
fn test_cli_version_flag_shows_version() {
    agenthost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("agenthost"));
}

#[test]
fn test_version_command_shows_version() {
    agenthost()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "agenthost {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let assert = agenthost().args(["version", "--json"]).assert().success();
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid JSON");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

// --- Argument validation ---

#[test]
fn test_unknown_command_fails() {
    agenthost()
        .arg("destroy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_up_rejects_skip_and_force_provision_together() {
    agenthost()
        .args(["up", "--skip-provision", "--force-provision"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_inventory_rejects_list_and_host_together() {
    agenthost()
        .args(["inventory", "--list", "--host", "x"])
        .assert()
        .code(2);
}
