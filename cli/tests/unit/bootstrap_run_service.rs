//! Tests for running a bootstrap plan stage by stage.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;

use agenthost_cli::application::services::bootstrap_run::run_plan;
use agenthost_cli::domain::bootstrap::{BootstrapPlan, Disposition};
use agenthost_cli::domain::config::keys;
use agenthost_cli::domain::projection::MaterializedSecrets;
use agenthost_cli::domain::stack::bootstrap_plan;
use agenthost_common::SecretString;

use crate::helpers::{config, source_with_agent};
use crate::mocks::{MockExecutor, RecordingReporter};

fn plan() -> BootstrapPlan {
    let cfg = config(
        &source_with_agent()
            .with_secret(keys::TELEGRAM_BOT_TOKEN, "123:bot")
            .with_plain("telegramUserId", "1001"),
    );
    let secrets = MaterializedSecrets {
        gateway_token: SecretString::new("gw-token"),
        deploy_keys: BTreeMap::from([
            ("workspace-deploy-key".to_string(), SecretString::new("PRIV main\n")),
            ("workspace-deploy-key-alice".to_string(), SecretString::new("PRIV alice\n")),
        ]),
    };
    bootstrap_plan(&cfg, &secrets).unwrap()
}

#[tokio::test]
async fn test_all_stages_run_in_order() {
    let plan = plan();
    let executor = MockExecutor::new();
    let reports = run_plan(&plan, &executor, &RecordingReporter::new())
        .await
        .unwrap();

    let expected: Vec<String> = plan.names().map(str::to_string).collect();
    assert_eq!(executor.executed(), expected);
    assert!(reports.iter().all(|r| r.disposition == Disposition::Succeeded));
}

#[tokio::test]
async fn test_expected_onboarding_error_is_success() {
    let executor = MockExecutor::new().exit("onboard-agent", 1, "Error: gateway closed (1006)");
    let reports = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap();
    let onboard = reports.iter().find(|r| r.name == "onboard-agent").unwrap();
    assert_eq!(onboard.disposition, Disposition::ExpectedFailure);
    assert_eq!(onboard.exit_code, 1);
}

#[tokio::test]
async fn test_setup_token_still_runs_after_tolerated_onboarding_error() {
    let executor = MockExecutor::new().exit("onboard-agent", 1, "Error: gateway closed (1006)");
    run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap();
    let executed = executor.executed();
    let onboard = executed.iter().position(|s| s == "onboard-agent").unwrap();
    let paste = executed.iter().position(|s| s == "setup-token").unwrap();
    assert!(onboard < paste);
}

#[tokio::test]
async fn test_setup_token_failure_is_fatal_even_after_gateway_closed() {
    let executor = MockExecutor::new()
        .exit("onboard-agent", 1, "Error: gateway closed (1006)")
        .exit("setup-token", 1, "Error: gateway closed (1006)");
    let err = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("setup-token"));
    assert!(!executor.executed().iter().any(|s| s == "gateway-config"));
}

#[tokio::test]
async fn test_workspace_setup_failure_is_fatal() {
    let executor = MockExecutor::new().exit("workspace-setup-main", 1, "git: not a repository");
    let err = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("workspace-setup-main"));
    assert!(!executor.executed().iter().any(|s| s.starts_with("workspace-push")));
}

#[tokio::test]
async fn test_unlogged_transcript_aborts_even_a_best_effort_stage() {
    let executor = MockExecutor::new().unlogged("chat-channels");
    let err = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("transcript was not logged"));
    assert_eq!(executor.executed().last().unwrap(), "chat-channels");
}

#[tokio::test]
async fn test_best_effort_failure_continues() {
    let plan = plan();
    let executor = MockExecutor::new()
        .exit("chat-channels", 1, "telegram unreachable")
        .exit("workspace-push", 128, "push rejected");
    let reporter = RecordingReporter::new();
    let reports = run_plan(&plan, &executor, &reporter).await.unwrap();

    assert_eq!(reports.len(), plan.stages.len());
    let tolerated: Vec<&str> = reports
        .iter()
        .filter(|r| r.disposition == Disposition::Tolerated)
        .map(|r| r.name.as_str())
        .collect();
    assert!(tolerated.contains(&"chat-channels"));
    assert!(tolerated.iter().any(|n| n.starts_with("workspace-push")));
    assert!(reporter.warnings().iter().any(|w| w.contains("best-effort")));
}

#[tokio::test]
async fn test_fatal_failure_stops_the_sequence() {
    let executor = MockExecutor::new().exit("join-overlay", 1, "invalid auth key");
    let err = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("join-overlay"));
    assert_eq!(executor.executed().last().unwrap(), "join-overlay");
    assert!(!executor.executed().iter().any(|s| s == "host-firewall"));
}

#[tokio::test]
async fn test_unexpected_onboarding_error_is_fatal() {
    let executor = MockExecutor::new().exit("onboard-agent", 1, "npm ERR! network");
    let err = run_plan(&plan(), &executor, &RecordingReporter::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("onboard-agent"));
    assert!(!executor.executed().iter().any(|s| s == "gateway-config"));
}
