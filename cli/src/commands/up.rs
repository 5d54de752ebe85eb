//! `agenthost up`: realize the stack, then provision the host.

use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::stack::{self as service, UpOptions};
use crate::domain::outputs::StackOutputs;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::hcloud::HcloudProvider;
use crate::infra::keygen::RandSecretGenerator;

#[derive(Args, Default)]
pub struct UpArgs {
    /// Apply without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Generated secret to regenerate (repeatable)
    #[arg(long, value_name = "NAME")]
    pub rotate: Vec<String>,

    /// Do not run the provision command
    #[arg(long, conflicts_with = "force_provision")]
    pub skip_provision: bool,

    /// Run the provision command even if this host was provisioned before
    #[arg(long)]
    pub force_provision: bool,
}

/// Run `agenthost up`.
///
/// # Errors
///
/// Returns an error if configuration is invalid, no provider token is
/// available, any resource fails, or provisioning fails.
pub async fn run(app: &AppContext, args: UpArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let rotate: BTreeSet<String> = args.rotate.into_iter().collect();

    let plans = service::preview(&config, &store, &rotate).await?;
    let changes = plans.iter().filter(|p| p.action.is_change()).count();
    if changes > 0 {
        if !app.is_json() {
            app.renderer().render_preview(&config.stack, &plans)?;
        }
        let prompt = format!("Apply {changes} change(s) to stack {}?", config.stack);
        if !app.confirm(&prompt, true)? {
            app.output.info("Cancelled.");
            return Ok(());
        }
    }

    let provider = HcloudProvider::from_env(config.hcloud_token.as_ref())?;
    let reporter = app.reporter();
    let outcome = service::up(
        &config,
        &store,
        &provider,
        &RandSecretGenerator,
        &TokioCommandRunner::default(),
        &reporter,
        UpOptions {
            rotate,
            skip_provision: args.skip_provision,
            force_provision: args.force_provision,
            provision_dir: app.project_dir(),
        },
    )
    .await?;

    if !outcome.report.is_success() {
        if !app.is_json() {
            let outputs = StackOutputs::collect(&outcome.state, &config);
            app.renderer().render_up(&config.stack, &outcome, &outputs)?;
        }
        let problems: Vec<String> = outcome
            .report
            .problems()
            .iter()
            .map(ToString::to_string)
            .collect();
        anyhow::bail!(
            "stack {} is incomplete: {}",
            config.stack,
            problems.join("; ")
        );
    }

    let outputs = StackOutputs::collect(&outcome.state, &config);
    app.renderer().render_up(&config.stack, &outcome, &outputs)
}
