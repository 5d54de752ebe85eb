//! `agenthost inventory`: Ansible dynamic inventory script interface.
//!
//! Output is always JSON, whatever `--json` says.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use crate::app::AppContext;
use crate::application::services::inventory::resolve_host;
use crate::domain::inventory;
use crate::infra::command_runner::TokioCommandRunner;

/// Overrides address discovery.
pub const SSH_HOST_ENV: &str = "AGENTHOST_SSH_HOST";

#[derive(Args, Default)]
pub struct InventoryArgs {
    /// Print the whole inventory (the default)
    #[arg(long, conflicts_with = "host")]
    pub list: bool,

    /// Print variables for one host (always `{}`; they live in `_meta`)
    #[arg(long, value_name = "NAME")]
    pub host: Option<String>,
}

/// Run `agenthost inventory`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub async fn run(app: &AppContext, args: &InventoryArgs) -> Result<()> {
    if args.host.is_some() {
        return print(&inventory::host_vars());
    }
    let config = app.load_config()?;
    let override_host = std::env::var(SSH_HOST_ENV).ok();
    let host = resolve_host(
        &TokioCommandRunner::default(),
        override_host.as_deref(),
        &config.server.name,
    )
    .await;
    tracing::debug!(%host, "inventory host resolved");
    print(&inventory::list(&host))
}

fn print(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}
