//! Opaque secret values.
//!
//! `SecretString` never prints its contents: `Debug` and `Display` both
//! redact. It deliberately has no `Serialize` impl; the state file opts in
//! through [`persisted`], which is the only place a secret is written out.

use std::fmt;

/// Placeholder shown wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[secret]";

/// A string that must not be logged, printed, or hashed by accident.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SecretString(String);

impl SecretString {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value. Call this only where the value is written to a
    /// permission-restricted destination (temp file, state file, child env).
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Character length of the secret, safe to report.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(")?;
        f.write_str(REDACTED)?;
        f.write_str(")")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Serde adapter for persisting secrets in the owner-only state file.
///
/// Use as `#[serde(with = "agenthost_common::secret::persisted")]`.
pub mod persisted {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SecretString;

    pub fn serialize<S: Serializer>(value: &SecretString, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(value.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<SecretString, D::Error> {
        String::deserialize(de).map(SecretString::new)
    }
}
