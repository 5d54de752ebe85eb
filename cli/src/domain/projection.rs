//! Configuration projection: `StackConfig` plus materialized secrets to the
//! flat `PROVISION_*` environment.

use std::collections::BTreeMap;

use agenthost_common::{FlatEnv, ProfileField, SecretString, global};

use crate::domain::config::{AgentProfile, StackConfig};
use crate::domain::error::ProjectionError;

/// Secrets generated by the stack rather than read from configuration.
#[derive(Debug, Clone, Default)]
pub struct MaterializedSecrets {
    pub gateway_token: SecretString,
    /// Private deploy keys keyed by logical name.
    pub deploy_keys: BTreeMap<String, SecretString>,
}

impl MaterializedSecrets {
    fn deploy_key(&self, profile: &AgentProfile) -> Result<&SecretString, ProjectionError> {
        let name = profile.deploy_key_name();
        self.deploy_keys
            .get(&name)
            .ok_or(ProjectionError::MissingSecret(name))
    }
}

/// Project the configuration into the flat environment.
///
/// Every declared key is emitted; unset optionals become `""`. The result is
/// ordered by key, so equal inputs give equal outputs.
///
/// # Errors
///
/// Returns `ProjectionError::MissingSecret` if a profile's deploy key has not
/// been materialized.
pub fn project(
    config: &StackConfig,
    secrets: &MaterializedSecrets,
) -> Result<FlatEnv, ProjectionError> {
    let mut env = FlatEnv::new();

    let ids: Vec<&str> = config
        .agents
        .iter()
        .filter_map(|p| p.id.as_ref().map(agenthost_common::AgentId::as_str))
        .collect();
    env.insert_plain(global::AGENT_IDS, Some(&ids.join(",")))?;
    env.insert_secret(global::GATEWAY_TOKEN, Some(&secrets.gateway_token))?;
    env.insert_secret(global::CLAUDE_SETUP_TOKEN, Some(&config.claude_setup_token))?;
    env.insert_secret(global::TAILSCALE_AUTH_KEY, Some(&config.tailscale_auth_key))?;
    env.insert_plain(global::TAILSCALE_HOSTNAME, Some(&config.server.name))?;
    env.insert_secret(global::TELEGRAM_BOT_TOKEN, config.telegram_bot_token.as_ref())?;
    env.insert_secret(global::DISCORD_BOT_TOKEN, config.discord_bot_token.as_ref())?;
    env.insert_value(global::DISCORD_GUILD_ID, config.discord_guild_id.as_ref())?;
    env.insert_value(global::DISCORD_USER_ID, config.discord_user_id.as_ref())?;
    env.insert_secret(global::XAI_API_KEY, config.xai_api_key.as_ref())?;
    env.insert_secret(global::GROQ_API_KEY, config.groq_api_key.as_ref())?;

    for profile in config.profiles() {
        let deploy_key = secrets.deploy_key(profile)?;
        for field in ProfileField::ALL {
            let key = field.env_key(profile.id.as_ref());
            match field {
                ProfileField::GithubToken => {
                    env.insert_secret(key, profile.github_token.as_ref())?;
                }
                ProfileField::WorkspaceDeployKey => env.insert_secret(key, Some(deploy_key))?,
                ProfileField::TelegramUserId => {
                    env.insert_value(key, profile.telegram_user_id.as_ref())?;
                }
                ProfileField::TelegramGroupId => {
                    env.insert_value(key, profile.telegram_group_id.as_ref())?;
                }
                ProfileField::WhatsappPhone => {
                    env.insert_value(key, profile.whatsapp_phone.as_ref())?;
                }
                ProfileField::WorkspaceRepoUrl => {
                    env.insert_value(key, profile.workspace_repo_url.as_ref())?;
                }
                ProfileField::NotesVaultRepoUrl => {
                    env.insert_value(key, profile.notes_vault_repo_url.as_ref())?;
                }
            }
        }
    }
    Ok(env)
}
