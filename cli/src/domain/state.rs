//! Persisted stack state: what was realized, under which inputs.

use std::collections::BTreeMap;

use agenthost_common::SecretString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATE_VERSION: u32 = 1;

/// Resource kinds, as recorded in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    RandomToken,
    Ed25519Key,
    Firewall,
    SshKey,
    Server,
}

impl ResourceKind {
    /// Locally generated secrets, realized without the provider.
    #[must_use]
    pub fn is_secret(self) -> bool {
        matches!(self, Self::RandomToken | Self::Ed25519Key)
    }
}

/// One output of a realized resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OutputValue {
    Plain(String),
    #[serde(with = "agenthost_common::secret::persisted")]
    Secret(SecretString),
}

impl OutputValue {
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(v) => v,
            Self::Secret(s) => s.expose_secret(),
        }
    }

    /// The value as a secret; plain values are wrapped.
    #[must_use]
    pub fn to_secret(&self) -> SecretString {
        match self {
            Self::Plain(v) => SecretString::new(v.as_str()),
            Self::Secret(s) => s.clone(),
        }
    }
}

pub type NodeOutputs = BTreeMap<String, OutputValue>;

/// What state remembers about one logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    /// Provider id; `None` for local secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Hash of the resolved inputs the resource was realized from.
    pub fingerprint: String,
    #[serde(default)]
    pub outputs: NodeOutputs,
}

impl ResourceRecord {
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&OutputValue> {
        self.outputs.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackState {
    pub version: u32,
    pub stack: String,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Host id the provisioning run last succeeded for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StackState {
    #[must_use]
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            stack: stack.into(),
            resources: BTreeMap::new(),
            provisioned_for: None,
            updated_at: None,
        }
    }

    /// Outputs of every realized resource, keyed by logical name.
    #[must_use]
    pub fn outputs_by_node(&self) -> BTreeMap<String, NodeOutputs> {
        self.resources
            .iter()
            .map(|(name, record)| (name.clone(), record.outputs.clone()))
            .collect()
    }

    #[must_use]
    pub fn output(&self, node: &str, key: &str) -> Option<&OutputValue> {
        self.resources.get(node)?.output(key)
    }

    #[must_use]
    pub fn provider_id(&self, node: &str) -> Option<&str> {
        self.resources.get(node)?.id.as_deref()
    }
}
