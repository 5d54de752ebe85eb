//! `agenthost outputs`: show the values recorded for the stack.

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::stack;
use crate::commands::ShowSecretsArgs;
use crate::domain::outputs::StackOutputs;

/// Run `agenthost outputs`.
///
/// # Errors
///
/// Returns an error if the configuration or state cannot be loaded.
pub async fn run(app: &AppContext, args: &ShowSecretsArgs) -> Result<()> {
    let config = app.load_config()?;
    let store = app.state_store(&config.stack)?;
    let state = stack::load_state(&store, &config).await?;
    if state.resources.is_empty() {
        app.output
            .warn(&format!("Stack {} has not been deployed. Run: agenthost up", config.stack));
    }
    let outputs = StackOutputs::collect(&state, &config);
    app.renderer().render_outputs(&outputs, args.show_secrets)
}
