//! Preview: what `up` would do to each resource, without touching the
//! provider.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::domain::error::GraphError;
use crate::domain::graph::{ResourceGraph, ResourceSpec};
use crate::domain::state::StackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannedAction {
    Create,
    Same,
    /// Changed in place (firewall rules).
    Update,
    /// Deleted, then created.
    Replace,
    /// Secret regenerated on request or after a kind change.
    Regenerate,
    /// Inputs depend on a resource that is not realized yet.
    Pending,
}

impl PlannedAction {
    #[must_use]
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Same)
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Same => "same",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Regenerate => "regenerate",
            Self::Pending => "pending",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodePlan {
    pub name: String,
    pub action: PlannedAction,
}

/// Decide an action per node, in realization order.
///
/// A node whose dependency will change is `pending` unless it is being
/// created anyway.
///
/// # Errors
///
/// Returns the graph's ordering errors.
pub fn plan_actions(
    graph: &ResourceGraph,
    state: &StackState,
    rotate: &BTreeSet<String>,
) -> Result<Vec<NodePlan>, GraphError> {
    let outputs = state.outputs_by_node();
    let mut decided: BTreeMap<String, PlannedAction> = BTreeMap::new();
    let mut plans = Vec::new();

    for wave in graph.waves()? {
        for name in wave {
            let Some(node) = graph.get(&name) else {
                continue;
            };
            let record = state.resources.get(&name);
            let action = match (&node.spec, record) {
                (_, None) => PlannedAction::Create,
                (ResourceSpec::Secret(kind), Some(record)) => {
                    if rotate.contains(&name) || record.fingerprint != kind.fingerprint() {
                        PlannedAction::Regenerate
                    } else {
                        PlannedAction::Same
                    }
                }
                (spec, Some(record)) => {
                    let upstream_changes = node
                        .dependencies()
                        .iter()
                        .any(|d| decided.get(*d).is_some_and(|a| a.is_change()));
                    if upstream_changes {
                        PlannedAction::Pending
                    } else {
                        match spec.resolve(&outputs) {
                            Ok(resolved) if resolved.fingerprint() == record.fingerprint => {
                                PlannedAction::Same
                            }
                            Ok(_) if matches!(spec, ResourceSpec::Firewall(_)) => {
                                PlannedAction::Update
                            }
                            Ok(_) => PlannedAction::Replace,
                            Err(GraphError::MissingOutput { .. }) => PlannedAction::Pending,
                            Err(e) => return Err(e),
                        }
                    }
                }
            };
            decided.insert(name.clone(), action);
            plans.push(NodePlan { name, action });
        }
    }
    Ok(plans)
}
