//! Application service: the follow-on configuration run.
//!
//! Provisioning is keyed on the host id: it fires for a host it has not yet
//! succeeded for, so a replaced host is provisioned again and an unchanged
//! one is left alone.

use std::path::PathBuf;

use agenthost_common::FlatEnv;
use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, ProgressReporter};

/// What to run, with which environment, and whether it is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionPlan {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: FlatEnv,
    /// Host id the run is for.
    pub trigger: String,
    pub fire: bool,
}

impl ProvisionPlan {
    /// Build the plan for host `trigger`.
    ///
    /// `command` is split on whitespace; the first word is the program.
    ///
    /// # Errors
    ///
    /// Returns an error if `command` is blank.
    pub fn new(
        command: &str,
        working_dir: Option<PathBuf>,
        env: FlatEnv,
        trigger: &str,
        last_fired: Option<&str>,
        force: bool,
    ) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| anyhow::anyhow!("provision command is empty"))?;
        Ok(Self {
            program,
            args: words.collect(),
            working_dir,
            env,
            trigger: trigger.to_string(),
            fire: force || last_fired != Some(trigger),
        })
    }
}

/// Run the plan if it is due. Returns whether it ran.
///
/// # Errors
///
/// Returns an error if the command cannot be started or exits non-zero.
pub async fn run_provision(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    plan: &ProvisionPlan,
) -> Result<bool> {
    if !plan.fire {
        tracing::debug!(host = %plan.trigger, "already provisioned, skipping");
        return Ok(false);
    }
    reporter.step(&format!("provisioning host {}...", plan.trigger));
    tracing::info!(program = %plan.program, host = %plan.trigger, "running provision command");
    let args: Vec<&str> = plan.args.iter().map(String::as_str).collect();
    let status = runner
        .run_with_env(&plan.program, &args, &plan.env, plan.working_dir.as_deref())
        .await
        .with_context(|| format!("running {}", plan.program))?;
    anyhow::ensure!(
        status.success(),
        "{} failed ({status}); re-run with `agenthost up --force-provision`",
        plan.program
    );
    reporter.success("host provisioned");
    Ok(true)
}
