// lib/crates/agenthost-common/src/agent.rs

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Profile id reserved for the implicit main agent.
pub const MAIN_PROFILE: &str = "main";

/// Owner name the main profile's notes vault is keyed by. Reserved, so a
/// named agent cannot share the main vault's keys.
pub const MAIN_VAULT_OWNER: &str = "andy";

/// Maximum length of a named agent id.
pub const MAX_AGENT_ID_LEN: usize = 32;

/// Logical name of the main agent's workspace deploy key.
pub const MAIN_DEPLOY_KEY: &str = "workspace-deploy-key";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgentIdError {
    #[error("invalid agent id '{0}': must match ^[a-z][a-z0-9]{{0,31}}$")]
    Invalid(String),

    #[error("agent id '{0}' is reserved for the main profile")]
    Reserved(String),

    #[error("agent id '{0}' is listed more than once")]
    Duplicate(String),
}

/// Id of a named (non-main) agent profile.
///
/// Lowercase ASCII letters and digits only, starting with a letter. That
/// keeps the id URL-safe and usable verbatim in environment variable names
/// once upper-cased, and makes upper-casing injective.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    pub fn parse(raw: &str) -> Result<Self, AgentIdError> {
        if raw == MAIN_PROFILE || raw == MAIN_VAULT_OWNER {
            return Err(AgentIdError::Reserved(raw.to_string()));
        }
        let mut chars = raw.chars();
        let valid_head = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_tail = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
        if !valid_head || !valid_tail || raw.len() > MAX_AGENT_ID_LEN {
            return Err(AgentIdError::Invalid(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First character upper-cased, remainder unchanged (`"tl"` -> `"Tl"`).
    #[must_use]
    pub fn pascal(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    /// Upper-cased id used as an environment key segment.
    #[must_use]
    pub fn upper(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// Logical name of this profile's workspace deploy key.
    #[must_use]
    pub fn deploy_key_name(&self) -> String {
        format!("{MAIN_DEPLOY_KEY}-{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentId {
    type Error = AgentIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

/// Parse the comma-separated `agentIds` setting.
///
/// Entries are trimmed and empty entries dropped, so `""`, `" , "` and
/// `"alice,"` are all valid. Order is preserved.
pub fn parse_agent_ids(raw: &str) -> Result<Vec<AgentId>, AgentIdError> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = AgentId::parse(entry)?;
        if !seen.insert(id.clone()) {
            return Err(AgentIdError::Duplicate(entry.to_string()));
        }
        ids.push(id);
    }
    Ok(ids)
}
