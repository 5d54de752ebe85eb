//! Tests for the provisioning trigger.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use agenthost_cli::application::services::provision::{ProvisionPlan, run_provision};
use agenthost_common::FlatEnv;

use crate::mocks::{MockRunner, RecordingReporter};

fn env() -> FlatEnv {
    let mut env = FlatEnv::new();
    env.insert_plain("PROVISION_TAILSCALE_HOSTNAME", Some("openclaw-vps"))
        .unwrap();
    env
}

#[test]
fn test_command_is_split_on_whitespace() {
    let plan = ProvisionPlan::new(
        "ansible-playbook  -i inventory.py site.yml",
        None,
        env(),
        "42",
        None,
        false,
    )
    .unwrap();
    assert_eq!(plan.program, "ansible-playbook");
    assert_eq!(plan.args, ["-i", "inventory.py", "site.yml"]);
}

#[test]
fn test_blank_command_is_rejected() {
    let err = ProvisionPlan::new("   ", None, env(), "42", None, false).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_fires_only_for_a_new_host_unless_forced() {
    let due = |last: Option<&str>, force: bool| {
        ProvisionPlan::new("./provision.sh", None, env(), "42", last, force)
            .unwrap()
            .fire
    };
    assert!(due(None, false));
    assert!(due(Some("41"), false), "replaced host is provisioned again");
    assert!(!due(Some("42"), false));
    assert!(due(Some("42"), true));
}

#[tokio::test]
async fn test_plan_not_due_runs_nothing() {
    let plan = ProvisionPlan::new("./provision.sh", None, env(), "42", Some("42"), false).unwrap();
    let runner = MockRunner::new();
    let ran = run_provision(&runner, &RecordingReporter::new(), &plan)
        .await
        .unwrap();
    assert!(!ran);
    assert!(runner.env_runs().is_empty());
}

#[tokio::test]
async fn test_due_plan_passes_env_and_reports() {
    let plan = ProvisionPlan::new("./provision.sh --check", None, env(), "42", None, false).unwrap();
    let runner = MockRunner::new();
    let reporter = RecordingReporter::new();
    let ran = run_provision(&runner, &reporter, &plan).await.unwrap();

    assert!(ran);
    let runs = runner.env_runs();
    assert_eq!(runs[0].args, ["--check"]);
    assert_eq!(runs[0].env, env());
    assert!(reporter.lines().iter().any(|l| l.starts_with("ok:")));
}

#[tokio::test]
async fn test_non_zero_exit_is_an_error() {
    let plan = ProvisionPlan::new("./provision.sh", None, env(), "42", None, false).unwrap();
    let err = run_provision(&MockRunner::with_env_exit(4), &RecordingReporter::new(), &plan)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("./provision.sh failed"));
}
