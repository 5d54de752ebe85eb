//! Domain types and validators for the stack configuration.
//!
//! Pure functions only, without I/O. The config file is parsed here from
//! text, but reading it is the caller's job.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use agenthost_common::{AgentId, EnvValue, ProfileField, SecretString, parse_agent_ids};
use regex::Regex;
use serde::Deserialize;

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_STACK: &str = "dev";
pub const DEFAULT_SERVER_NAME: &str = "openclaw-vps";
pub const DEFAULT_SERVER_TYPE: &str = "cx33";
pub const DEFAULT_SERVER_LOCATION: &str = "nbg1";
pub const DEFAULT_SERVER_IMAGE: &str = "ubuntu-24.04";
pub const DEFAULT_PROVISION_COMMAND: &str = "./scripts/provision.sh";
pub const DEFAULT_HEALTH_ATTEMPTS: u32 = 30;
pub const DEFAULT_HEALTH_DELAY_SECS: u32 = 2;

/// Configuration keys that are not per-profile.
pub mod keys {
    pub const TAILSCALE_AUTH_KEY: &str = "tailscaleAuthKey";
    pub const CLAUDE_SETUP_TOKEN: &str = "claudeSetupToken";
    pub const TELEGRAM_BOT_TOKEN: &str = "telegramBotToken";
    pub const DISCORD_BOT_TOKEN: &str = "discordBotToken";
    pub const XAI_API_KEY: &str = "xaiApiKey";
    pub const GROQ_API_KEY: &str = "groqApiKey";
    pub const HCLOUD_TOKEN: &str = "hcloudToken";
    pub const TAILNET_DNS_NAME: &str = "tailnetDnsName";
    pub const SERVER_NAME: &str = "serverName";
    pub const SERVER_TYPE: &str = "serverType";
    pub const SERVER_LOCATION: &str = "serverLocation";
    pub const SERVER_IMAGE: &str = "serverImage";
    pub const DISCORD_GUILD_ID: &str = "discordGuildId";
    pub const DISCORD_USER_ID: &str = "discordUserId";
    pub const AGENT_IDS: &str = "agentIds";
    pub const PROVISION_COMMAND: &str = "provisionCommand";
    pub const HEALTH_CHECK_ATTEMPTS: &str = "healthCheckAttempts";
    pub const HEALTH_CHECK_DELAY_SECS: &str = "healthCheckDelaySecs";

    pub const GLOBAL: &[&str] = &[
        TAILSCALE_AUTH_KEY,
        CLAUDE_SETUP_TOKEN,
        TELEGRAM_BOT_TOKEN,
        DISCORD_BOT_TOKEN,
        XAI_API_KEY,
        GROQ_API_KEY,
        HCLOUD_TOKEN,
        TAILNET_DNS_NAME,
        SERVER_NAME,
        SERVER_TYPE,
        SERVER_LOCATION,
        SERVER_IMAGE,
        DISCORD_GUILD_ID,
        DISCORD_USER_ID,
        AGENT_IDS,
        PROVISION_COMMAND,
        HEALTH_CHECK_ATTEMPTS,
        HEALTH_CHECK_DELAY_SECS,
    ];
}

/// Server names become the overlay hostname, so they must be DNS labels.
pub static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex")
});

// ── Config file schema ───────────────────────────────────────────────────────

/// One value in the `config:` map of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// `{ secret: "..." }`
    Secret { secret: String },
    /// `{ secretEnv: "VAR" }`, read from the process environment.
    SecretEnv {
        #[serde(rename = "secretEnv")]
        secret_env: String,
    },
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

/// Top-level shape of `agenthost.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_stack")]
    pub stack: String,
    #[serde(default)]
    pub config: BTreeMap<String, RawValue>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            stack: default_stack(),
            config: BTreeMap::new(),
        }
    }
}

fn default_stack() -> String {
    DEFAULT_STACK.to_string()
}

impl ConfigFile {
    /// Parse the YAML text of a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the stack name is unsafe.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let file: Self = serde_yaml::from_str(text).map_err(|e| ConfigError::InvalidValue {
            key: "config file".to_string(),
            reason: e.to_string(),
        })?;
        if !HOSTNAME_RE.is_match(&file.stack) {
            return Err(ConfigError::InvalidValue {
                key: "stack".to_string(),
                reason: format!("'{}' must be lowercase letters, digits and '-'", file.stack),
            });
        }
        Ok(file)
    }

    /// Resolve `secretEnv` indirections with `lookup` and drop empty values.
    ///
    /// An unset `secretEnv` variable leaves the key absent.
    #[must_use]
    pub fn resolve(self, lookup: impl Fn(&str) -> Option<String>) -> ConfigSource {
        let mut entries = BTreeMap::new();
        for (key, raw) in self.config {
            let entry = match raw {
                RawValue::Secret { secret } => ConfigEntry::Secret(SecretString::new(secret)),
                RawValue::SecretEnv { secret_env } => match lookup(&secret_env) {
                    Some(value) => ConfigEntry::Secret(SecretString::new(value)),
                    None => continue,
                },
                RawValue::Text(text) => ConfigEntry::Plain(text),
                RawValue::Number(n) => ConfigEntry::Plain(n.to_string()),
                RawValue::Bool(b) => ConfigEntry::Plain(b.to_string()),
            };
            if !entry.is_empty() {
                entries.insert(key, entry);
            }
        }
        ConfigSource {
            stack: self.stack,
            entries,
        }
    }
}

// ── Resolved source ──────────────────────────────────────────────────────────

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    Plain(String),
    Secret(SecretString),
}

impl ConfigEntry {
    fn is_empty(&self) -> bool {
        match self {
            Self::Plain(v) => v.trim().is_empty(),
            Self::Secret(s) => s.is_empty(),
        }
    }
}

/// Sparse key/value view of the configuration, secrets already marked.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub stack: String,
    entries: BTreeMap<String, ConfigEntry>,
}

impl ConfigSource {
    #[must_use]
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Builder used by tests and the in-memory callers.
    #[must_use]
    pub fn with_plain(mut self, key: &str, value: &str) -> Self {
        self.entries
            .insert(key.to_string(), ConfigEntry::Plain(value.to_string()));
        self
    }

    #[must_use]
    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.entries
            .insert(key.to_string(), ConfigEntry::Secret(SecretString::new(value)));
        self
    }

    /// Plain value of `key`. A secret read as plain text is exposed as-is, so
    /// this is only for settings that are never projected or printed.
    #[must_use]
    pub fn plain(&self, key: &str) -> Option<String> {
        match self.entries.get(key)? {
            ConfigEntry::Plain(v) => Some(v.trim().to_string()),
            ConfigEntry::Secret(s) => Some(s.expose_secret().to_string()),
        }
    }

    /// Secret value of `key`. A plain value is promoted to a secret.
    #[must_use]
    pub fn secret(&self, key: &str) -> Option<SecretString> {
        match self.entries.get(key)? {
            ConfigEntry::Plain(v) => Some(SecretString::new(v.trim())),
            ConfigEntry::Secret(s) => Some(s.clone()),
        }
    }

    /// Value of `key` that stays a secret when the source marks it one.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<EnvValue> {
        match self.entries.get(key)? {
            ConfigEntry::Plain(v) => Some(EnvValue::Plain(v.trim().to_string())),
            ConfigEntry::Secret(s) => Some(EnvValue::Secret(s.clone())),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

// ── Stack configuration ──────────────────────────────────────────────────────

/// Host shape passed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub name: String,
    pub server_type: String,
    pub location: String,
    pub image: String,
}

/// Readiness poll of the gateway health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub attempts: u32,
    pub delay_secs: u32,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_HEALTH_ATTEMPTS,
            delay_secs: DEFAULT_HEALTH_DELAY_SECS,
        }
    }
}

/// One agent's settings. `id == None` is the implicit main profile.
///
/// Every optional field disables its feature when absent. Plain fields keep
/// the secret marking of the source so projection can redact them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: Option<AgentId>,
    pub github_token: Option<SecretString>,
    pub telegram_user_id: Option<EnvValue>,
    pub telegram_group_id: Option<EnvValue>,
    pub whatsapp_phone: Option<EnvValue>,
    pub workspace_repo_url: Option<EnvValue>,
    pub notes_vault_repo_url: Option<EnvValue>,
}

impl AgentProfile {
    /// `main` or the agent id.
    #[must_use]
    pub fn label(&self) -> &str {
        self.id
            .as_ref()
            .map_or(agenthost_common::MAIN_PROFILE, AgentId::as_str)
    }

    /// Logical name of the deploy keypair this profile owns.
    #[must_use]
    pub fn deploy_key_name(&self) -> String {
        self.id.as_ref().map_or_else(
            || agenthost_common::MAIN_DEPLOY_KEY.to_string(),
            AgentId::deploy_key_name,
        )
    }

    fn set(&mut self, field: ProfileField, source: &ConfigSource, key: &str) {
        match field {
            ProfileField::GithubToken => self.github_token = source.secret(key),
            ProfileField::TelegramUserId => self.telegram_user_id = source.value(key),
            ProfileField::TelegramGroupId => self.telegram_group_id = source.value(key),
            ProfileField::WhatsappPhone => self.whatsapp_phone = source.value(key),
            ProfileField::WorkspaceRepoUrl => self.workspace_repo_url = source.value(key),
            ProfileField::NotesVaultRepoUrl => self.notes_vault_repo_url = source.value(key),
            ProfileField::WorkspaceDeployKey => {}
        }
    }
}

/// The whole configuration, validated once at the entry point.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub stack: String,
    pub tailscale_auth_key: SecretString,
    pub claude_setup_token: SecretString,
    pub telegram_bot_token: Option<SecretString>,
    pub discord_bot_token: Option<SecretString>,
    pub xai_api_key: Option<SecretString>,
    pub groq_api_key: Option<SecretString>,
    pub hcloud_token: Option<SecretString>,
    pub tailnet_dns_name: Option<String>,
    pub discord_guild_id: Option<EnvValue>,
    pub discord_user_id: Option<EnvValue>,
    pub server: ServerSettings,
    pub main: AgentProfile,
    pub agents: Vec<AgentProfile>,
    pub readiness: Readiness,
    pub provision_command: String,
    /// Keys present in the source that nothing reads.
    pub unknown_keys: Vec<String>,
}

impl StackConfig {
    /// Validate `source` and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::RequiredMissing` listing every missing required
    /// key, or another `ConfigError` for malformed values.
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        let tailscale_auth_key = source.secret(keys::TAILSCALE_AUTH_KEY);
        let claude_setup_token = source.secret(keys::CLAUDE_SETUP_TOKEN);
        let (Some(tailscale_auth_key), Some(claude_setup_token)) =
            (tailscale_auth_key.clone(), claude_setup_token.clone())
        else {
            let missing = [
                (keys::TAILSCALE_AUTH_KEY, tailscale_auth_key.is_none()),
                (keys::CLAUDE_SETUP_TOKEN, claude_setup_token.is_none()),
            ]
            .into_iter()
            .filter_map(|(k, missing)| missing.then(|| k.to_string()))
            .collect();
            return Err(ConfigError::RequiredMissing(missing));
        };

        let ids = parse_agent_ids(&source.plain(keys::AGENT_IDS).unwrap_or_default())?;
        let main = read_profile(source, None)?;
        let agents = ids
            .into_iter()
            .map(|id| read_profile(source, Some(id)))
            .collect::<Result<Vec<_>, _>>()?;

        let server = ServerSettings {
            name: source
                .plain(keys::SERVER_NAME)
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            server_type: source
                .plain(keys::SERVER_TYPE)
                .unwrap_or_else(|| DEFAULT_SERVER_TYPE.to_string()),
            location: source
                .plain(keys::SERVER_LOCATION)
                .unwrap_or_else(|| DEFAULT_SERVER_LOCATION.to_string()),
            image: source
                .plain(keys::SERVER_IMAGE)
                .unwrap_or_else(|| DEFAULT_SERVER_IMAGE.to_string()),
        };
        if !HOSTNAME_RE.is_match(&server.name) {
            return Err(ConfigError::InvalidValue {
                key: keys::SERVER_NAME.to_string(),
                reason: format!(
                    "'{}' must be a DNS label (lowercase letters, digits, '-')",
                    server.name
                ),
            });
        }

        let readiness = Readiness {
            attempts: parse_positive(source, keys::HEALTH_CHECK_ATTEMPTS, DEFAULT_HEALTH_ATTEMPTS)?,
            delay_secs: parse_positive(
                source,
                keys::HEALTH_CHECK_DELAY_SECS,
                DEFAULT_HEALTH_DELAY_SECS,
            )?,
        };

        let mut config = Self {
            stack: source.stack.clone(),
            tailscale_auth_key,
            claude_setup_token,
            telegram_bot_token: source.secret(keys::TELEGRAM_BOT_TOKEN),
            discord_bot_token: source.secret(keys::DISCORD_BOT_TOKEN),
            xai_api_key: source.secret(keys::XAI_API_KEY),
            groq_api_key: source.secret(keys::GROQ_API_KEY),
            hcloud_token: source.secret(keys::HCLOUD_TOKEN),
            tailnet_dns_name: source.plain(keys::TAILNET_DNS_NAME),
            discord_guild_id: source.value(keys::DISCORD_GUILD_ID),
            discord_user_id: source.value(keys::DISCORD_USER_ID),
            server,
            main,
            agents,
            readiness,
            provision_command: source
                .plain(keys::PROVISION_COMMAND)
                .unwrap_or_else(|| DEFAULT_PROVISION_COMMAND.to_string()),
            unknown_keys: Vec::new(),
        };
        let known = config.known_keys();
        config.unknown_keys = source
            .keys()
            .filter(|k| !known.contains(*k))
            .map(str::to_string)
            .collect();
        Ok(config)
    }

    /// Main profile first, then named agents in `agentIds` order.
    pub fn profiles(&self) -> impl Iterator<Item = &AgentProfile> {
        std::iter::once(&self.main).chain(self.agents.iter())
    }

    /// Every key this configuration reads, aliases included.
    #[must_use]
    pub fn known_keys(&self) -> BTreeSet<String> {
        let mut known: BTreeSet<String> = keys::GLOBAL.iter().map(|k| (*k).to_string()).collect();
        for profile in self.profiles() {
            for field in ProfileField::ALL {
                known.extend(field.config_key(profile.id.as_ref()));
                if let Some(id) = &profile.id {
                    known.extend(field.config_alias(id));
                }
            }
        }
        known
    }
}

fn read_profile(source: &ConfigSource, id: Option<AgentId>) -> Result<AgentProfile, ConfigError> {
    let mut profile = AgentProfile {
        id,
        ..AgentProfile::default()
    };
    for field in ProfileField::ALL {
        let Some(canonical) = field.config_key(profile.id.as_ref()) else {
            continue;
        };
        let alias = profile.id.as_ref().and_then(|id| field.config_alias(id));
        let key = match alias {
            Some(alias) if source.plain(&alias).is_some() => {
                if let Some(value) = source.plain(&canonical)
                    && Some(value) != source.plain(&alias)
                {
                    return Err(ConfigError::ConflictingKeys { canonical, alias });
                }
                alias
            }
            _ => canonical,
        };
        profile.set(field, source, &key);
    }
    Ok(profile)
}

fn parse_positive(source: &ConfigSource, key: &str, default: u32) -> Result<u32, ConfigError> {
    let Some(raw) = source.plain(key) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{raw}' is not a positive integer"),
        }),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
