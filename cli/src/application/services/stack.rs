//! Application service for the stack use-cases `preview` and `up`, plus the
//! local secret materialization behind `env` and `render-bootstrap`.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::{
    CloudProvider, CommandRunner, ProgressReporter, SecretGenerator, StackStateStore,
};
use crate::application::services::provision::{ProvisionPlan, run_provision};
use crate::application::services::realize::{RealizeReport, materialize_secrets, realize};
use crate::domain::config::StackConfig;
use crate::domain::graph::{ResourceGraph, ResourceSpec};
use crate::domain::plan::{NodePlan, plan_actions};
use crate::domain::projection::{MaterializedSecrets, project};
use crate::domain::stack::{SERVER, build_graph};
use crate::domain::state::StackState;

pub struct UpOptions {
    /// Secrets to regenerate.
    pub rotate: BTreeSet<String>,
    pub skip_provision: bool,
    pub force_provision: bool,
    /// Directory the provision command runs in.
    pub provision_dir: Option<PathBuf>,
}

/// Outcome of the `up` use-case.
#[derive(Debug)]
pub struct UpOutcome {
    pub report: RealizeReport,
    /// Whether the provision command ran.
    pub provisioned: bool,
    pub state: StackState,
}

/// Load state for `config`'s stack, or start empty.
///
/// # Errors
///
/// Returns an error if the state cannot be read or belongs to another stack.
pub async fn load_state(store: &impl StackStateStore, config: &StackConfig) -> Result<StackState> {
    let state = store
        .load_async()
        .await?
        .unwrap_or_else(|| StackState::new(&config.stack));
    anyhow::ensure!(
        state.stack == config.stack,
        "state file belongs to stack '{}', config declares '{}'",
        state.stack,
        config.stack
    );
    Ok(state)
}

/// Check every `--rotate` name against the graph's secrets.
///
/// # Errors
///
/// Returns an error naming the first unknown or non-secret resource.
pub fn validate_rotate(graph: &ResourceGraph, rotate: &BTreeSet<String>) -> Result<()> {
    for name in rotate {
        match graph.get(name) {
            Some(node) if matches!(node.spec, ResourceSpec::Secret(_)) => {}
            Some(_) => anyhow::bail!("'{name}' is not a generated secret and cannot be rotated"),
            None => anyhow::bail!("unknown resource '{name}'"),
        }
    }
    Ok(())
}

/// What `up` would do, without provider calls or state changes.
///
/// # Errors
///
/// Returns an error if state cannot be loaded or the graph is invalid.
pub async fn preview(
    config: &StackConfig,
    store: &impl StackStateStore,
    rotate: &BTreeSet<String>,
) -> Result<Vec<NodePlan>> {
    let state = load_state(store, config).await?;
    let graph = build_graph(config)?;
    validate_rotate(&graph, rotate)?;
    Ok(plan_actions(&graph, &state, rotate)?)
}

/// Realize the stack and, when due, provision the host.
///
/// Node failures are returned in the report; provisioning only runs when
/// every node was realized.
///
/// # Errors
///
/// Returns an error if state cannot be loaded or saved, the graph is
/// invalid, or the provision command fails.
#[allow(clippy::too_many_arguments)]
pub async fn up(
    config: &StackConfig,
    store: &impl StackStateStore,
    provider: &impl CloudProvider,
    generator: &impl SecretGenerator,
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    opts: UpOptions,
) -> Result<UpOutcome> {
    let mut state = load_state(store, config).await?;
    let graph = build_graph(config)?;
    validate_rotate(&graph, &opts.rotate)?;

    let report = realize(
        &graph,
        &mut state,
        provider,
        generator,
        store,
        reporter,
        &opts.rotate,
    )
    .await?;
    if !report.is_success() {
        return Ok(UpOutcome {
            report,
            provisioned: false,
            state,
        });
    }

    let server_id = state
        .provider_id(SERVER)
        .map(str::to_string)
        .context("server was realized without an id")?;
    if opts.skip_provision {
        reporter.warn("provisioning skipped (--skip-provision)");
        return Ok(UpOutcome {
            report,
            provisioned: false,
            state,
        });
    }

    let secrets = MaterializedSecrets::from_state(&state, config)?;
    let env = project(config, &secrets)?;
    let plan = ProvisionPlan::new(
        &config.provision_command,
        opts.provision_dir,
        env,
        &server_id,
        state.provisioned_for.as_deref(),
        opts.force_provision,
    )?;
    let provisioned = run_provision(runner, reporter, &plan).await?;
    if provisioned {
        state.provisioned_for = Some(server_id);
        state.updated_at = Some(chrono::Utc::now());
        store
            .save_async(&state)
            .await
            .context("saving stack state")?;
    }

    Ok(UpOutcome {
        report,
        provisioned,
        state,
    })
}

/// Materialize the generated secrets locally and persist their bindings.
///
/// Used by commands that need the projected environment or payload without
/// touching the provider.
///
/// # Errors
///
/// Returns an error if state cannot be loaded or saved or a secret cannot be
/// generated.
pub async fn local_secrets(
    config: &StackConfig,
    store: &impl StackStateStore,
    generator: &impl SecretGenerator,
    rotate: &BTreeSet<String>,
) -> Result<MaterializedSecrets> {
    let mut state = load_state(store, config).await?;
    let graph = build_graph(config)?;
    validate_rotate(&graph, rotate)?;
    let before = state.clone();
    materialize_secrets(&graph, &mut state, generator, rotate)?;
    if state != before {
        store
            .save_async(&state)
            .await
            .context("saving stack state")?;
    }
    Ok(MaterializedSecrets::from_state(&state, config)?)
}
