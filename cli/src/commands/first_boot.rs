//! `agenthost _first-boot`: run the bootstrap stages on this machine.
//!
//! Executes the same plan the startup payload carries, stage by stage, with
//! secrets taken from stack state. Used to repair a host in place.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::services::bootstrap_run::run_plan;
use crate::application::services::stack;
use crate::domain::bootstrap::BOOTSTRAP_LOG;
use crate::domain::projection::MaterializedSecrets;
use crate::domain::stack::bootstrap_plan;
use crate::infra::stage_executor::BashStageExecutor;
use crate::output::progress;

#[derive(Args)]
pub struct FirstBootArgs {
    /// Append stage transcripts to this file
    #[arg(long, default_value = BOOTSTRAP_LOG)]
    pub log: PathBuf,

    /// Run without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Run `agenthost _first-boot`.
///
/// # Errors
///
/// Returns an error if the stack has no generated secrets yet, or a fatal
/// stage fails.
pub async fn run(app: &AppContext, args: &FirstBootArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let state = stack::load_state(&store, &config).await?;
    let secrets = MaterializedSecrets::from_state(&state, &config)
        .context("stack secrets are not materialized; run `agenthost up` first")?;
    let plan = bootstrap_plan(&config, &secrets)?;

    let prompt = format!(
        "Run {} bootstrap stages for {} on this machine?",
        plan.stages.len(),
        plan.hostname
    );
    if !app.confirm(&prompt, true)? {
        app.output.info("Cancelled.");
        return Ok(());
    }

    let executor = BashStageExecutor::new(args.log.clone());
    let spinner = app
        .output
        .show_progress()
        .then(|| progress::spinner(&format!("Bootstrapping {}", plan.hostname)));
    let reporter = match &spinner {
        Some(pb) => app.reporter().with_spinner(pb.clone()),
        None => app.reporter(),
    };

    match run_plan(&plan, &executor, &reporter).await {
        Ok(reports) => {
            if let Some(pb) = &spinner {
                progress::finish_ok(pb, &format!("{} stages complete", reports.len()));
            }
            app.output
                .success(&format!("Bootstrap finished; log at {}", args.log.display()));
            Ok(())
        }
        Err(e) => {
            if let Some(pb) = &spinner {
                progress::finish_error(pb, "bootstrap aborted");
            }
            Err(e.context(format!("see {}", args.log.display())))
        }
    }
}
