//! Application service: realize the resource graph.
//!
//! Nodes are realized wave by wave; the nodes of one wave run concurrently.
//! A failed node marks its transitive dependents skipped while independent
//! nodes carry on. Results are persisted after every wave and nothing is
//! rolled back.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;

use crate::application::ports::{
    CloudProvider, ProgressReporter, ProviderResource, SecretGenerator, StackStateStore,
};
use crate::application::services::secrets::{Materialized, materialize};
use crate::domain::error::GraphError;
use crate::domain::graph::{ResolvedSpec, ResourceGraph, ResourceNode, ResourceSpec};
use crate::domain::plan::PlannedAction;
use crate::domain::stack::keys;
use crate::domain::state::{NodeOutputs, OutputValue, ResourceRecord, StackState};

/// Final status of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Done(PlannedAction),
    Failed(GraphError),
    Skipped(GraphError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealizeReport {
    /// Per node, in realization order.
    pub nodes: Vec<(String, NodeStatus)>,
}

impl RealizeReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.nodes
            .iter()
            .all(|(_, s)| matches!(s, NodeStatus::Done(_)))
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<&NodeStatus> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Failed and skipped nodes with their reasons.
    #[must_use]
    pub fn problems(&self) -> Vec<&GraphError> {
        self.nodes
            .iter()
            .filter_map(|(_, s)| match s {
                NodeStatus::Failed(e) | NodeStatus::Skipped(e) => Some(e),
                NodeStatus::Done(_) => None,
            })
            .collect()
    }
}

/// Realize every node of `graph`, updating `state` and persisting it after
/// each wave.
///
/// `rotate` names secrets to regenerate regardless of their binding.
///
/// # Errors
///
/// Returns an error if the graph cannot be ordered or state cannot be
/// saved. Node failures are reported in the `RealizeReport`.
pub async fn realize(
    graph: &ResourceGraph,
    state: &mut StackState,
    provider: &impl CloudProvider,
    generator: &impl SecretGenerator,
    store: &impl StackStateStore,
    reporter: &impl ProgressReporter,
    rotate: &BTreeSet<String>,
) -> Result<RealizeReport> {
    let waves = graph.waves()?;
    let mut report = RealizeReport::default();
    let mut blocked: BTreeMap<String, String> = BTreeMap::new();

    for (index, wave) in waves.iter().enumerate() {
        tracing::debug!(wave = index, nodes = ?wave, "realizing wave");
        let outputs = state.outputs_by_node();
        let mut runnable = Vec::new();
        for name in wave {
            let Some(node) = graph.get(name) else {
                continue;
            };
            let failed_dep = node
                .dependencies()
                .into_iter()
                .find_map(|d| blocked.get(d).cloned());
            if let Some(failed) = failed_dep {
                tracing::warn!(node = %name, %failed, "skipping node");
                blocked.insert(name.clone(), failed.clone());
                report.nodes.push((
                    name.clone(),
                    NodeStatus::Skipped(GraphError::DependencyFailed {
                        node: name.clone(),
                        failed,
                    }),
                ));
                continue;
            }
            runnable.push(node);
        }

        let results = join_all(runnable.iter().map(|node| {
            let existing = state.resources.get(&node.name);
            let force = rotate.contains(&node.name);
            let outputs = &outputs;
            async move {
                reporter.step(&format!("{}...", node.name));
                let result =
                    realize_node(provider, generator, node, existing, outputs, force).await;
                (node.name.clone(), result)
            }
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok((record, action)) => {
                    tracing::info!(node = %name, %action, "realized");
                    if action.is_change() {
                        reporter.success(&format!("{name}: {action}"));
                    }
                    state.resources.insert(name.clone(), record);
                    report.nodes.push((name, NodeStatus::Done(action)));
                }
                Err(e) => {
                    tracing::error!(node = %name, error = %format!("{e:#}"), "realization failed");
                    reporter.warn(&format!("{name}: {e:#}"));
                    blocked.insert(name.clone(), name.clone());
                    let error = match e.downcast::<GraphError>() {
                        Ok(graph_error) => graph_error,
                        Err(other) => GraphError::Provider {
                            node: name.clone(),
                            message: format!("{other:#}"),
                        },
                    };
                    report.nodes.push((name, NodeStatus::Failed(error)));
                }
            }
        }

        state.updated_at = Some(Utc::now());
        store
            .save_async(state)
            .await
            .context("saving stack state")?;
    }

    Ok(report)
}

/// Materialize only the generated secrets of `graph`; no provider calls.
///
/// # Errors
///
/// Returns an error if a secret cannot be generated.
pub fn materialize_secrets(
    graph: &ResourceGraph,
    state: &mut StackState,
    generator: &impl SecretGenerator,
    rotate: &BTreeSet<String>,
) -> Result<Vec<(String, Materialized)>> {
    let mut done = Vec::new();
    for node in graph.nodes() {
        let ResourceSpec::Secret(kind) = node.spec else {
            continue;
        };
        let (record, how) = materialize(
            generator,
            &node.name,
            kind,
            state.resources.get(&node.name),
            rotate.contains(&node.name),
        )?;
        state.resources.insert(node.name.clone(), record);
        done.push((node.name.clone(), how));
    }
    if done.iter().any(|(_, how)| *how != Materialized::Reused) {
        state.updated_at = Some(Utc::now());
    }
    Ok(done)
}

async fn realize_node(
    provider: &impl CloudProvider,
    generator: &impl SecretGenerator,
    node: &ResourceNode,
    existing: Option<&ResourceRecord>,
    outputs: &BTreeMap<String, NodeOutputs>,
    force: bool,
) -> Result<(ResourceRecord, PlannedAction)> {
    if let ResourceSpec::Secret(kind) = node.spec {
        let (record, how) = materialize(generator, &node.name, kind, existing, force)?;
        let action = match how {
            Materialized::Generated => PlannedAction::Create,
            Materialized::Reused => PlannedAction::Same,
            Materialized::Regenerated => PlannedAction::Regenerate,
        };
        return Ok((record, action));
    }

    let resolved = node.spec.resolve(outputs)?;
    let fingerprint = resolved.fingerprint();
    let unchanged = existing.is_some_and(|r| r.fingerprint == fingerprint);
    let existing_id = existing.and_then(|r| r.id.clone());

    let (resource, action) = match &resolved {
        ResolvedSpec::Secret(_) => unreachable_secret(&node.name)?,
        ResolvedSpec::Firewall(policy) => {
            let live = match &existing_id {
                Some(id) => provider
                    .read_firewall(id)
                    .await
                    .with_context(|| format!("reading firewall {id}"))?,
                None => None,
            };
            match live {
                Some(live) if unchanged => (live, PlannedAction::Same),
                Some(live) => {
                    provider
                        .update_firewall_rules(&live.id, policy)
                        .await
                        .with_context(|| format!("updating firewall {}", live.id))?;
                    (live, PlannedAction::Update)
                }
                None => {
                    warn_drift(&node.name, existing_id.as_deref());
                    let created = provider
                        .create_firewall(policy)
                        .await
                        .context("creating firewall")?;
                    (created, PlannedAction::Create)
                }
            }
        }
        ResolvedSpec::SshKey(key) => {
            let live = match &existing_id {
                Some(id) => provider
                    .read_ssh_key(id)
                    .await
                    .with_context(|| format!("reading SSH key {id}"))?,
                None => None,
            };
            match live {
                Some(live) if unchanged => (live, PlannedAction::Same),
                Some(live) => {
                    provider
                        .delete_ssh_key(&live.id)
                        .await
                        .with_context(|| format!("deleting SSH key {}", live.id))?;
                    let created = provider
                        .create_ssh_key(key)
                        .await
                        .context("creating SSH key")?;
                    (created, PlannedAction::Replace)
                }
                None => {
                    warn_drift(&node.name, existing_id.as_deref());
                    let created = provider
                        .create_ssh_key(key)
                        .await
                        .context("creating SSH key")?;
                    (created, PlannedAction::Create)
                }
            }
        }
        ResolvedSpec::Server(server) => {
            let live = match &existing_id {
                Some(id) => provider
                    .read_server(id)
                    .await
                    .with_context(|| format!("reading server {id}"))?,
                None => None,
            };
            match live {
                Some(live) if unchanged => (live, PlannedAction::Same),
                Some(live) => {
                    tracing::info!(server = %live.id, "replacing server");
                    provider
                        .delete_server(&live.id)
                        .await
                        .with_context(|| format!("deleting server {}", live.id))?;
                    let created = provider
                        .create_server(server)
                        .await
                        .context("creating server")?;
                    (created, PlannedAction::Replace)
                }
                None => {
                    warn_drift(&node.name, existing_id.as_deref());
                    let created = provider
                        .create_server(server)
                        .await
                        .context("creating server")?;
                    (created, PlannedAction::Create)
                }
            }
        }
    };

    Ok((
        ResourceRecord {
            kind: node.spec.kind(),
            id: Some(resource.id.clone()),
            fingerprint,
            outputs: provider_outputs(resource),
        },
        action,
    ))
}

fn unreachable_secret(name: &str) -> Result<(ProviderResource, PlannedAction)> {
    Err(GraphError::Derivation(format!("secret '{name}' reached the provider path")).into())
}

fn warn_drift(node: &str, id: Option<&str>) {
    if let Some(id) = id {
        tracing::warn!(%node, %id, "resource missing at provider, recreating");
    }
}

fn provider_outputs(resource: ProviderResource) -> NodeOutputs {
    let mut outputs: NodeOutputs = resource
        .attributes
        .into_iter()
        .map(|(k, v)| (k, OutputValue::Plain(v)))
        .collect();
    outputs.insert(keys::ID.to_string(), OutputValue::Plain(resource.id));
    outputs
}
