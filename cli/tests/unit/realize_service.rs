//! Tests for the graph realization service against the in-memory provider.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use agenthost_cli::application::services::realize::{NodeStatus, realize};
use agenthost_cli::domain::error::GraphError;
use agenthost_cli::domain::plan::PlannedAction;
use agenthost_cli::domain::stack::{FIREWALL, GATEWAY_TOKEN, SERVER, SSH_KEY, build_graph, keys};
use agenthost_cli::domain::state::StackState;

use crate::helpers::{config, minimal_config, source_with_agent};
use crate::mocks::{MemoryStore, MockProvider, RecordingReporter, SeqGenerator};

fn no_rotation() -> BTreeSet<String> {
    BTreeSet::new()
}

#[tokio::test]
async fn test_fresh_stack_creates_every_node_and_saves_per_wave() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let mut state = StackState::new("dev");

    let report = realize(
        &graph,
        &mut state,
        &provider,
        &SeqGenerator::new(),
        &store,
        &RecordingReporter::new(),
        &no_rotation(),
    )
    .await
    .unwrap();

    assert!(report.is_success());
    assert!(
        report
            .nodes
            .iter()
            .all(|(_, s)| *s == NodeStatus::Done(PlannedAction::Create))
    );
    assert_eq!(provider.count("create_firewall"), 1);
    assert_eq!(provider.count("create_ssh_key"), 1);
    assert_eq!(provider.count("create_server"), 1);
    assert_eq!(store.saves(), graph.waves().unwrap().len());

    let server_id = state.provider_id(SERVER).unwrap().to_string();
    let user_data = provider.server_user_data(&server_id).unwrap();
    let token = state.output(GATEWAY_TOKEN, keys::RESULT).unwrap().expose().to_string();
    assert!(user_data.contains(&token), "payload carries the live gateway token");
    assert!(state.output(SERVER, keys::IPV4).is_some());
    assert_eq!(store.current().unwrap(), state);
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let cfg = config(&source_with_agent());
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let first = state.clone();
    let generated = generator.generated();

    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();

    assert!(
        report
            .nodes
            .iter()
            .all(|(_, s)| *s == NodeStatus::Done(PlannedAction::Same)),
        "{report:?}"
    );
    assert_eq!(generator.generated(), generated, "no secret regenerated");
    assert_eq!(provider.count("create_server"), 1);
    assert_eq!(state.resources, first.resources);
}

#[tokio::test]
async fn test_rotating_the_gateway_token_replaces_the_host() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let old_token = state.output(GATEWAY_TOKEN, keys::RESULT).unwrap().clone();

    let rotate: BTreeSet<String> = [GATEWAY_TOKEN.to_string()].into();
    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &rotate)
        .await
        .unwrap();

    assert_eq!(
        report.status(GATEWAY_TOKEN),
        Some(&NodeStatus::Done(PlannedAction::Regenerate))
    );
    assert_ne!(state.output(GATEWAY_TOKEN, keys::RESULT).unwrap(), &old_token);
    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Done(PlannedAction::Replace))
    );
    assert_eq!(provider.count("delete_server"), 1);
    assert_eq!(provider.count("create_server"), 2);
    let server_id = state.provider_id(SERVER).unwrap().to_string();
    let user_data = provider.server_user_data(&server_id).unwrap();
    assert!(user_data.contains(state.output(GATEWAY_TOKEN, keys::RESULT).unwrap().expose()));
    assert!(!user_data.contains(old_token.expose()));
}

#[tokio::test]
async fn test_provider_failure_skips_dependents_only() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::failing("create_ssh_key");
    let store = MemoryStore::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    let report = realize(
        &graph,
        &mut state,
        &provider,
        &SeqGenerator::new(),
        &store,
        &reporter,
        &no_rotation(),
    )
    .await
    .unwrap();

    assert!(!report.is_success());
    assert!(matches!(
        report.status(SSH_KEY),
        Some(NodeStatus::Failed(GraphError::Provider { node, message }))
            if node == SSH_KEY && message.contains("quota exceeded")
    ));
    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Skipped(GraphError::DependencyFailed {
            node: SERVER.to_string(),
            failed: SSH_KEY.to_string(),
        }))
    );
    assert_eq!(
        report.status(FIREWALL),
        Some(&NodeStatus::Done(PlannedAction::Create))
    );
    assert_eq!(provider.count("create_server"), 0);
    assert_eq!(report.problems().len(), 2);

    // What did succeed is persisted, nothing is rolled back.
    let saved = store.current().unwrap();
    assert!(saved.provider_id(FIREWALL).is_some());
    assert!(saved.resources.contains_key(GATEWAY_TOKEN));
    assert!(!saved.resources.contains_key(SERVER));
    assert!(reporter.warnings().iter().any(|w| w.contains(SSH_KEY)));
}

#[tokio::test]
async fn test_server_missing_at_provider_is_recreated() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let old_id = state.provider_id(SERVER).unwrap().to_string();
    provider.forget_server(&old_id);

    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();

    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Done(PlannedAction::Create))
    );
    assert_ne!(state.provider_id(SERVER).unwrap(), old_id);
    assert_eq!(provider.count("delete_server"), 0);
}

#[tokio::test]
async fn test_ssh_key_missing_at_provider_is_recreated() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let old_key = state.provider_id(SSH_KEY).unwrap().to_string();
    let old_server = state.provider_id(SERVER).unwrap().to_string();
    provider.forget_ssh_key(&old_key);

    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.status(SSH_KEY),
        Some(&NodeStatus::Done(PlannedAction::Create))
    );
    assert_ne!(state.provider_id(SSH_KEY).unwrap(), old_key);
    assert_eq!(provider.count("read_ssh_key"), 1);
    assert_eq!(provider.count("delete_ssh_key"), 0);
    assert_eq!(provider.count("create_ssh_key"), 2);
    // The host references the key by id, so it follows the new key.
    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Done(PlannedAction::Replace))
    );
    assert_ne!(state.provider_id(SERVER).unwrap(), old_server);
}

#[tokio::test]
async fn test_changed_firewall_is_updated_in_place() {
    let cfg = minimal_config();
    let graph = build_graph(&cfg).unwrap();
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let firewall_id = state.provider_id(FIREWALL).unwrap().to_string();
    state
        .resources
        .get_mut(FIREWALL)
        .unwrap()
        .fingerprint = "stale".to_string();

    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();

    assert_eq!(
        report.status(FIREWALL),
        Some(&NodeStatus::Done(PlannedAction::Update))
    );
    assert_eq!(provider.count("update_firewall_rules"), 1);
    assert_eq!(provider.count("create_firewall"), 1);
    assert_eq!(state.provider_id(FIREWALL).unwrap(), firewall_id);
    // The firewall id is unchanged, so the server stays.
    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Done(PlannedAction::Same))
    );
}

#[tokio::test]
async fn test_changed_server_shape_replaces_the_host() {
    let provider = MockProvider::new();
    let store = MemoryStore::new();
    let generator = SeqGenerator::new();
    let reporter = RecordingReporter::new();
    let mut state = StackState::new("dev");

    let small = minimal_config();
    let graph = build_graph(&small).unwrap();
    realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();
    let old_id = state.provider_id(SERVER).unwrap().to_string();

    let large = config(&crate::helpers::minimal_source().with_plain("serverType", "cx53"));
    let graph = build_graph(&large).unwrap();
    let report = realize(&graph, &mut state, &provider, &generator, &store, &reporter, &no_rotation())
        .await
        .unwrap();

    assert_eq!(
        report.status(SERVER),
        Some(&NodeStatus::Done(PlannedAction::Replace))
    );
    assert_eq!(provider.count("delete_server"), 1);
    assert_ne!(state.provider_id(SERVER).unwrap(), old_id);
}
