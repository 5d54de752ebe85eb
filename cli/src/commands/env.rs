//! `agenthost env`: print the flat provisioning environment.
//!
//! Generated secrets are materialized locally when missing, so the output
//! matches what `up` will hand to the provision command.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::stack;
use crate::commands::ShowSecretsArgs;
use crate::domain::projection::project;
use crate::infra::keygen::RandSecretGenerator;

/// Run `agenthost env`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or state cannot be read
/// or written.
pub async fn run(app: &AppContext, args: &ShowSecretsArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let secrets =
        stack::local_secrets(&config, &store, &RandSecretGenerator, &BTreeSet::new()).await?;
    let env = project(&config, &secrets)?;
    app.renderer().render_env(&env, args.show_secrets)
}
