//! `agenthost render-bootstrap`: print the first-boot script.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::stack;
use crate::commands::ShowSecretsArgs;
use crate::domain::stack::startup_payload;
use crate::infra::keygen::RandSecretGenerator;

/// Run `agenthost render-bootstrap`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, state cannot be read or
/// written, or the script cannot be rendered.
pub async fn run(app: &AppContext, args: &ShowSecretsArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let secrets =
        stack::local_secrets(&config, &store, &RandSecretGenerator, &BTreeSet::new()).await?;
    let payload = startup_payload(&config, &secrets)?;
    app.renderer().render_bootstrap(&payload, args.show_secrets)
}
