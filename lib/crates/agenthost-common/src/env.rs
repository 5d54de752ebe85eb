//! The flat provisioning environment handed to the downstream run.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use thiserror::Error;

use crate::env_keys::is_valid_env_key;
use crate::secret::{REDACTED, SecretString};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("environment key '{0}' is projected twice")]
    DuplicateKey(String),

    #[error("'{0}' is not a valid environment variable name")]
    InvalidKey(String),
}

/// A projected value: plain text or a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Plain(String),
    Secret(SecretString),
}

impl EnvValue {
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret(_))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Plain(v) => v.is_empty(),
            Self::Secret(s) => s.is_empty(),
        }
    }

    /// Raw value. Only for the child-process boundary and the renderer.
    #[must_use]
    pub fn expose(&self) -> &str {
        match self {
            Self::Plain(v) => v,
            Self::Secret(s) => s.expose_secret(),
        }
    }

    /// Value for human display; non-empty secrets are redacted unless asked.
    #[must_use]
    pub fn display(&self, show_secrets: bool) -> &str {
        match self {
            Self::Secret(s) if !show_secrets && !s.is_empty() => REDACTED,
            other => other.expose(),
        }
    }
}

/// Sorted, duplicate-free map of environment keys to values.
///
/// Ordering is by key, so two projections of the same input render
/// byte-identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatEnv {
    entries: BTreeMap<String, EnvValue>,
}

impl FlatEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: EnvValue) -> Result<(), EnvError> {
        let key = key.into();
        if !is_valid_env_key(&key) {
            return Err(EnvError::InvalidKey(key));
        }
        match self.entries.entry(key) {
            Entry::Occupied(e) => Err(EnvError::DuplicateKey(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
        }
    }

    /// Insert a plain value; `None` becomes the empty string.
    pub fn insert_plain(&mut self, key: impl Into<String>, value: Option<&str>) -> Result<(), EnvError> {
        self.insert(key, EnvValue::Plain(value.unwrap_or_default().to_string()))
    }

    /// Insert a configured value as-is; `None` becomes the empty string.
    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: Option<&EnvValue>,
    ) -> Result<(), EnvError> {
        self.insert(
            key,
            value
                .cloned()
                .unwrap_or_else(|| EnvValue::Plain(String::new())),
        )
    }

    /// Insert a secret value; `None` becomes an empty secret.
    pub fn insert_secret(
        &mut self,
        key: impl Into<String>,
        value: Option<&SecretString>,
    ) -> Result<(), EnvError> {
        self.insert(key, EnvValue::Secret(value.cloned().unwrap_or_default()))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.entries.get(key)
    }

    /// The value at `key` if present and non-empty.
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&EnvValue> {
        self.entries.get(key).filter(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw `(key, value)` pairs for a child process environment.
    #[must_use]
    pub fn exposed_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.expose().to_string()))
            .collect()
    }

    /// `KEY=value` lines, one per key, secrets redacted unless requested.
    #[must_use]
    pub fn to_dotenv(&self, show_secrets: bool) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value.display(show_secrets));
            out.push('\n');
        }
        out
    }
}
