//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use agenthost_common::{FlatEnv, SecretString};
use anyhow::Result;

use crate::domain::bootstrap::StageOutcome;
use crate::domain::graph::{ResolvedServer, ResolvedSshKey};
use crate::domain::network::NetworkPolicy;
use crate::domain::state::StackState;

// ── Value Types ───────────────────────────────────────────────────────────────

/// A resource as the provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderResource {
    /// Provider-assigned id, as text.
    pub id: String,
    /// Extra read-only attributes (addresses, status), keyed by output name.
    pub attributes: BTreeMap<String, String>,
}

impl ProviderResource {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// An ed25519 keypair in OpenSSH text encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKeypair {
    pub public_key_openssh: String,
    pub private_key_openssh: SecretString,
}

// ── Cloud Provider Port ───────────────────────────────────────────────────────

/// Firewall, SSH key and server lifecycle at the cloud provider.
///
/// `read_*` returns `None` when the provider no longer knows the id.
#[allow(async_fn_in_trait)]
pub trait CloudProvider {
    async fn create_firewall(&self, policy: &NetworkPolicy) -> Result<ProviderResource>;
    async fn read_firewall(&self, id: &str) -> Result<Option<ProviderResource>>;
    /// Replace the firewall's rule set in place.
    async fn update_firewall_rules(&self, id: &str, policy: &NetworkPolicy) -> Result<()>;
    async fn create_ssh_key(&self, key: &ResolvedSshKey) -> Result<ProviderResource>;
    async fn read_ssh_key(&self, id: &str) -> Result<Option<ProviderResource>>;
    /// Delete an SSH key; an unknown id is not an error.
    async fn delete_ssh_key(&self, id: &str) -> Result<()>;
    async fn create_server(&self, server: &ResolvedServer) -> Result<ProviderResource>;
    async fn read_server(&self, id: &str) -> Result<Option<ProviderResource>>;
    /// Delete a server and return once the deletion has finished, so its
    /// name is free again. An unknown id is not an error.
    async fn delete_server(&self, id: &str) -> Result<()>;
}

// ── Secret Generation Port ────────────────────────────────────────────────────

/// Source of fresh credentials. Sync trait: generation never blocks on I/O.
pub trait SecretGenerator {
    /// Random `[A-Za-z0-9]` token of exactly `length` characters.
    fn random_token(&self, length: usize) -> Result<SecretString>;
    fn ed25519_keypair(&self) -> Result<GeneratedKeypair>;
}

// ── State Port ────────────────────────────────────────────────────────────────

/// Abstracts stack state persistence (load/save).
#[allow(async_fn_in_trait)]
pub trait StackStateStore {
    /// Load the stack state, returning `None` if nothing was realized yet.
    async fn load_async(&self) -> Result<Option<StackState>>;
    /// Persist the given stack state.
    async fn save_async(&self, state: &StackState) -> Result<()>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<Output>;
    /// Run a program with inherited stdio, `env` added to its environment and
    /// an optional working directory; no timeout.
    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &FlatEnv,
        working_dir: Option<&Path>,
    ) -> Result<ExitStatus>;
}

// ── Stage Execution Port ──────────────────────────────────────────────────────

/// Runs one rendered bootstrap stage on the local host.
#[allow(async_fn_in_trait)]
pub trait StageExecutor {
    /// Execute `script` and return its exit code and combined output.
    ///
    /// Failure to start the interpreter or to record the transcript is an
    /// error; a non-zero exit is reported through the outcome.
    async fn execute(&self, stage: &str, script: &SecretString) -> Result<StageOutcome>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
