//! `agenthost preview`: show what `up` would change, without provider calls.

use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::stack;

#[derive(Args, Default)]
pub struct PreviewArgs {
    /// Generated secret to regenerate (repeatable)
    #[arg(long, value_name = "NAME")]
    pub rotate: Vec<String>,
}

/// Run `agenthost preview`.
///
/// # Errors
///
/// Returns an error if the configuration or state cannot be loaded, or a
/// `--rotate` name is not a generated secret.
pub async fn run(app: &AppContext, args: &PreviewArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let rotate: BTreeSet<String> = args.rotate.iter().cloned().collect();
    let plans = stack::preview(&config, &store, &rotate).await?;
    app.renderer().render_preview(&config.stack, &plans)
}
