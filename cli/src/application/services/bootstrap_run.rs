//! Application service: run a bootstrap plan stage by stage on this host.

use anyhow::{Context, Result};

use crate::application::ports::{ProgressReporter, StageExecutor};
use crate::domain::bootstrap::{BootstrapPlan, Disposition, render_stage_script};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: String,
    pub disposition: Disposition,
    pub exit_code: i32,
}

/// Run every stage in order, applying each stage's failure policy.
///
/// Stages after a fatal failure do not run.
///
/// # Errors
///
/// Returns an error naming the stage when a fatal stage fails, or when a
/// stage cannot be rendered or started.
pub async fn run_plan(
    plan: &BootstrapPlan,
    executor: &impl StageExecutor,
    reporter: &impl ProgressReporter,
) -> Result<Vec<StageReport>> {
    let mut reports = Vec::with_capacity(plan.stages.len());
    for stage in &plan.stages {
        reporter.step(&format!("{}...", stage.name));
        let script = render_stage_script(stage)?;
        let outcome = executor
            .execute(&stage.name, &script)
            .await
            .with_context(|| format!("running stage {}", stage.name))?;
        let disposition = stage.policy.disposition(&outcome);
        tracing::info!(
            stage = %stage.name,
            exit_code = outcome.exit_code,
            ?disposition,
            "stage finished"
        );
        match disposition {
            Disposition::Succeeded => reporter.success(&stage.name),
            Disposition::ExpectedFailure => {
                reporter.success(&format!("{} (expected error, continuing)", stage.name));
            }
            Disposition::Tolerated => reporter.warn(&format!(
                "{} failed with exit {} (best-effort, continuing)",
                stage.name, outcome.exit_code
            )),
            Disposition::Abort => {
                anyhow::bail!(
                    "bootstrap stage {} failed with exit {} ({})",
                    stage.name,
                    outcome.exit_code,
                    stage.policy
                );
            }
        }
        reports.push(StageReport {
            name: stage.name.clone(),
            disposition,
            exit_code: outcome.exit_code,
        });
    }
    Ok(reports)
}
