/// Provisioning environment key names.
///
/// Every key handed to the downstream configuration-management run starts
/// with [`PREFIX`]. Keys belonging to a named agent carry the agent's
/// upper-cased id as exactly one `_`-delimited segment; keys of the main
/// profile carry none, except the notes vault, which names its owner.
use crate::agent::AgentId;

/// Common prefix of every projected key.
pub const PREFIX: &str = "PROVISION_";

/// Keys shared by every profile.
pub mod global {
    /// Comma-joined list of named agent ids.
    pub const AGENT_IDS: &str = "PROVISION_AGENT_IDS";
    pub const GATEWAY_TOKEN: &str = "PROVISION_GATEWAY_TOKEN";
    pub const CLAUDE_SETUP_TOKEN: &str = "PROVISION_CLAUDE_SETUP_TOKEN";
    pub const TAILSCALE_AUTH_KEY: &str = "PROVISION_TAILSCALE_AUTH_KEY";
    pub const TAILSCALE_HOSTNAME: &str = "PROVISION_TAILSCALE_HOSTNAME";
    pub const TELEGRAM_BOT_TOKEN: &str = "PROVISION_TELEGRAM_BOT_TOKEN";
    pub const DISCORD_BOT_TOKEN: &str = "PROVISION_DISCORD_BOT_TOKEN";
    pub const DISCORD_GUILD_ID: &str = "PROVISION_DISCORD_GUILD_ID";
    pub const DISCORD_USER_ID: &str = "PROVISION_DISCORD_USER_ID";
    pub const XAI_API_KEY: &str = "PROVISION_XAI_API_KEY";
    pub const GROQ_API_KEY: &str = "PROVISION_GROQ_API_KEY";

    /// Every global key, in declaration order.
    pub const ALL: &[&str] = &[
        AGENT_IDS,
        GATEWAY_TOKEN,
        CLAUDE_SETUP_TOKEN,
        TAILSCALE_AUTH_KEY,
        TAILSCALE_HOSTNAME,
        TELEGRAM_BOT_TOKEN,
        DISCORD_BOT_TOKEN,
        DISCORD_GUILD_ID,
        DISCORD_USER_ID,
        XAI_API_KEY,
        GROQ_API_KEY,
    ];
}

/// A per-profile setting, projected once for main and once per named agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    GithubToken,
    TelegramUserId,
    TelegramGroupId,
    WhatsappPhone,
    WorkspaceRepoUrl,
    NotesVaultRepoUrl,
    /// Materialized, never read from configuration.
    WorkspaceDeployKey,
}

impl ProfileField {
    pub const ALL: [ProfileField; 7] = [
        ProfileField::GithubToken,
        ProfileField::TelegramUserId,
        ProfileField::TelegramGroupId,
        ProfileField::WhatsappPhone,
        ProfileField::WorkspaceRepoUrl,
        ProfileField::NotesVaultRepoUrl,
        ProfileField::WorkspaceDeployKey,
    ];

    /// Id segment the main profile uses in place of an agent id.
    ///
    /// The main notes vault is keyed by its owner
    /// ([`MAIN_VAULT_OWNER`](crate::agent::MAIN_VAULT_OWNER)):
    /// `obsidianAndyVaultRepoUrl`.
    fn main_infix(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::NotesVaultRepoUrl => Some(("ANDY", "Andy")),
            _ => None,
        }
    }

    /// Env segments around the agent id: `(head, tail)`.
    fn env_segments(self) -> (&'static str, &'static str) {
        match self {
            Self::GithubToken => ("GITHUB_TOKEN", ""),
            Self::TelegramUserId => ("TELEGRAM", "USER_ID"),
            Self::TelegramGroupId => ("TELEGRAM", "GROUP_ID"),
            Self::WhatsappPhone => ("WHATSAPP", "PHONE"),
            Self::WorkspaceRepoUrl => ("WORKSPACE", "REPO_URL"),
            Self::NotesVaultRepoUrl => ("OBSIDIAN", "VAULT_REPO_URL"),
            Self::WorkspaceDeployKey => ("WORKSPACE", "DEPLOY_KEY"),
        }
    }

    /// Config key segments around the pascal-cased agent id.
    fn config_segments(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::GithubToken => Some(("githubToken", "")),
            Self::TelegramUserId => Some(("telegram", "UserId")),
            Self::TelegramGroupId => Some(("telegram", "GroupId")),
            Self::WhatsappPhone => Some(("whatsapp", "Phone")),
            Self::WorkspaceRepoUrl => Some(("workspace", "RepoUrl")),
            Self::NotesVaultRepoUrl => Some(("obsidian", "VaultRepoUrl")),
            Self::WorkspaceDeployKey => None,
        }
    }

    /// Whether the projected value is a secret.
    #[must_use]
    pub fn is_secret(self) -> bool {
        matches!(self, Self::GithubToken | Self::WorkspaceDeployKey)
    }

    /// Environment key for the main profile (`None`) or a named agent.
    ///
    /// `PROVISION_TELEGRAM_USER_ID` / `PROVISION_TELEGRAM_ALICE_USER_ID`.
    #[must_use]
    pub fn env_key(self, agent: Option<&AgentId>) -> String {
        let (head, tail) = self.env_segments();
        let upper = match agent {
            Some(id) => Some(id.upper()),
            None => self.main_infix().map(|(upper, _)| upper.to_string()),
        };
        let segments = [Some(head), upper.as_deref(), Some(tail)];
        let body: Vec<&str> = segments
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        format!("{PREFIX}{}", body.join("_"))
    }

    /// Canonical configuration key: `telegramUserId` / `telegramAliceUserId`.
    #[must_use]
    pub fn config_key(self, agent: Option<&AgentId>) -> Option<String> {
        let (head, tail) = self.config_segments()?;
        let pascal = match agent {
            Some(id) => id.pascal(),
            None => self
                .main_infix()
                .map(|(_, pascal)| pascal.to_string())
                .unwrap_or_default(),
        };
        Some(format!("{head}{pascal}{tail}"))
    }

    /// Suffix-form alias accepted for named agents: `telegramUserIdAlice`.
    ///
    /// `None` when the alias would equal the canonical key.
    #[must_use]
    pub fn config_alias(self, agent: &AgentId) -> Option<String> {
        let (head, tail) = self.config_segments()?;
        if tail.is_empty() {
            return None;
        }
        Some(format!("{head}{tail}{}", agent.pascal()))
    }
}

/// Returns `true` if `key` is a well-formed environment variable name.
#[must_use]
pub fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
