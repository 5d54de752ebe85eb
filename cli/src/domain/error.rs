//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use agenthost_common::{AgentIdError, EnvError};
use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while turning the configuration surface into a `StackConfig`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {}\n\nSet them in the config file, e.g. `{}: {{ secret: \"...\" }}`", .0.join(", "), .0.first().map_or("key", String::as_str))]
    RequiredMissing(Vec<String>),

    #[error("Invalid agentIds: {0}")]
    AgentIds(#[from] AgentIdError),

    #[error("Both {canonical} and {alias} are set; keep only one")]
    ConflictingKeys { canonical: String, alias: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

// ── Network policy errors ─────────────────────────────────────────────────────

/// Violations of the egress-only perimeter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Network policy '{policy}' has an inbound rule ({description}); inbound rules are never allowed")]
    InboundRule { policy: String, description: String },
}

// ── Projection errors ─────────────────────────────────────────────────────────

/// Errors from projecting configuration into the flat environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Secret '{0}' has not been materialized")]
    MissingSecret(String),

    #[error(transparent)]
    Env(#[from] EnvError),
}

// ── Graph errors ──────────────────────────────────────────────────────────────

/// Errors from declaring, ordering, or resolving the resource graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Resource '{0}' is declared twice")]
    DuplicateNode(String),

    #[error("Resource '{node}' references unknown resource '{target}'")]
    UnknownReference { node: String, target: String },

    #[error("Dependency cycle between resources: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Output '{key}' of resource '{node}' is not available yet")]
    MissingOutput { node: String, key: String },

    #[error("Output '{key}' of resource '{node}' is not {expected}")]
    Coercion {
        node: String,
        key: String,
        expected: &'static str,
    },

    #[error("Cannot derive input: {0}")]
    Derivation(String),

    #[error("Provider error on '{node}': {message}")]
    Provider { node: String, message: String },

    #[error("Skipped '{node}': dependency '{failed}' failed")]
    DependencyFailed { node: String, failed: String },
}

// ── Bootstrap errors ──────────────────────────────────────────────────────────

/// Errors from sequencing or rendering the first-boot payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Bootstrap input {0} is missing or empty")]
    MissingInput(String),

    #[error("Bootstrap input {key} is invalid: {reason}")]
    InvalidInput { key: String, reason: String },

    #[error("Workspace repository URL for '{profile}' is not an SSH or HTTPS git remote: {url}")]
    UnsupportedRepoUrl { profile: String, url: String },

    #[error("Secret for stage '{stage}' contains the heredoc terminator")]
    UnsafeSecret { stage: String },

    #[error("Startup payload is {size} bytes; the provider accepts at most {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
}
