//! Hand-written port mocks shared by the service tests.
//!
//! Each mock records the calls it receives so tests can assert on the
//! interaction, not only on the result.

#![allow(dead_code, clippy::expect_used)]

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agenthost_cli::application::ports::{
    CloudProvider, CommandRunner, GeneratedKeypair, ProgressReporter, ProviderResource,
    SecretGenerator, StackStateStore, StageExecutor,
};
use agenthost_cli::domain::bootstrap::StageOutcome;
use agenthost_cli::domain::graph::{ResolvedServer, ResolvedSshKey};
use agenthost_cli::domain::network::NetworkPolicy;
use agenthost_cli::domain::state::StackState;
use agenthost_common::{FlatEnv, SecretString};
use anyhow::Result;

use crate::helpers::{exit_status, ok_output};

// ── Cloud provider ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Cloud {
    next_id: u64,
    firewalls: BTreeMap<String, NetworkPolicy>,
    ssh_keys: BTreeMap<String, String>,
    /// Server id to its user data.
    servers: BTreeMap<String, String>,
    calls: Vec<String>,
}

impl Cloud {
    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-memory provider. Ids are sequential numbers starting at 1.
#[derive(Default)]
pub struct MockProvider {
    cloud: Mutex<Cloud>,
    fail_on: Option<&'static str>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `operation` fails with a quota error.
    pub fn failing(operation: &'static str) -> Self {
        Self {
            fail_on: Some(operation),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.cloud.lock().expect("lock").calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| *c == operation).count()
    }

    pub fn server_user_data(&self, id: &str) -> Option<String> {
        self.cloud.lock().expect("lock").servers.get(id).cloned()
    }

    /// Simulate an SSH key deleted outside the tool.
    pub fn forget_ssh_key(&self, id: &str) {
        self.cloud.lock().expect("lock").ssh_keys.remove(id);
    }

    /// Simulate a server deleted outside the tool.
    pub fn forget_server(&self, id: &str) {
        self.cloud.lock().expect("lock").servers.remove(id);
    }

    fn record(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, Cloud>> {
        let mut cloud = self.cloud.lock().expect("lock");
        cloud.calls.push(operation.to_string());
        if self.fail_on == Some(operation) {
            anyhow::bail!("{operation}: resource_limit_exceeded: quota exceeded");
        }
        Ok(cloud)
    }
}

fn server_resource(id: &str) -> ProviderResource {
    ProviderResource::new(id)
        .with_attribute("status", "running")
        .with_attribute("ipv4Address", format!("203.0.113.{id}"))
        .with_attribute("ipv6Address", "2001:db8::/64")
}

impl CloudProvider for MockProvider {
    async fn create_firewall(&self, policy: &NetworkPolicy) -> Result<ProviderResource> {
        let mut cloud = self.record("create_firewall")?;
        let id = cloud.id();
        cloud.firewalls.insert(id.clone(), policy.clone());
        Ok(ProviderResource::new(id))
    }

    async fn read_firewall(&self, id: &str) -> Result<Option<ProviderResource>> {
        let cloud = self.record("read_firewall")?;
        Ok(cloud
            .firewalls
            .contains_key(id)
            .then(|| ProviderResource::new(id)))
    }

    async fn update_firewall_rules(&self, id: &str, policy: &NetworkPolicy) -> Result<()> {
        let mut cloud = self.record("update_firewall_rules")?;
        cloud.firewalls.insert(id.to_string(), policy.clone());
        Ok(())
    }

    async fn create_ssh_key(&self, key: &ResolvedSshKey) -> Result<ProviderResource> {
        let mut cloud = self.record("create_ssh_key")?;
        let id = cloud.id();
        cloud.ssh_keys.insert(id.clone(), key.public_key.clone());
        Ok(ProviderResource::new(id))
    }

    async fn read_ssh_key(&self, id: &str) -> Result<Option<ProviderResource>> {
        let cloud = self.record("read_ssh_key")?;
        Ok(cloud
            .ssh_keys
            .contains_key(id)
            .then(|| ProviderResource::new(id)))
    }

    async fn delete_ssh_key(&self, id: &str) -> Result<()> {
        let mut cloud = self.record("delete_ssh_key")?;
        cloud.ssh_keys.remove(id);
        Ok(())
    }

    async fn create_server(&self, server: &ResolvedServer) -> Result<ProviderResource> {
        let mut cloud = self.record("create_server")?;
        let id = cloud.id();
        cloud
            .servers
            .insert(id.clone(), server.user_data().expose_secret().to_string());
        Ok(server_resource(&id))
    }

    async fn read_server(&self, id: &str) -> Result<Option<ProviderResource>> {
        let cloud = self.record("read_server")?;
        Ok(cloud.servers.contains_key(id).then(|| server_resource(id)))
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        let mut cloud = self.record("delete_server")?;
        cloud.servers.remove(id);
        Ok(())
    }
}

// ── Secret generator ─────────────────────────────────────────────────────────

/// Deterministic generator: every call yields a new numbered value.
#[derive(Default)]
pub struct SeqGenerator {
    counter: AtomicUsize,
}

impl SeqGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generated(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    fn next(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl SecretGenerator for SeqGenerator {
    fn random_token(&self, length: usize) -> Result<SecretString> {
        let mut token = format!("tok{}", self.next());
        while token.len() < length {
            token.push('x');
        }
        token.truncate(length);
        Ok(SecretString::new(token))
    }

    fn ed25519_keypair(&self) -> Result<GeneratedKeypair> {
        let n = self.next();
        Ok(GeneratedKeypair {
            public_key_openssh: format!("ssh-ed25519 PUB{n}"),
            private_key_openssh: SecretString::new(format!("PRIV{n}\n")),
        })
    }
}

// ── State store ──────────────────────────────────────────────────────────────

/// State held in memory; counts saves.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<StackState>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StackState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<StackState> {
        self.state.lock().expect("lock").clone()
    }
}

impl StackStateStore for MemoryStore {
    async fn load_async(&self) -> Result<Option<StackState>> {
        Ok(self.current())
    }

    async fn save_async(&self, state: &StackState) -> Result<()> {
        *self.state.lock().expect("lock") = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Command runner ───────────────────────────────────────────────────────────

/// One `run_with_env` invocation.
#[derive(Debug, Clone)]
pub struct EnvRun {
    pub program: String,
    pub args: Vec<String>,
    pub env: FlatEnv,
    pub working_dir: Option<PathBuf>,
}

/// Runner with canned captured outputs and a fixed exit code for
/// `run_with_env`.
pub struct MockRunner {
    outputs: Mutex<VecDeque<Result<Output>>>,
    env_exit: i32,
    pub env_runs: Mutex<Vec<EnvRun>>,
    pub commands: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::with_env_exit(0)
    }

    pub fn with_env_exit(code: i32) -> Self {
        Self {
            outputs: Mutex::new(VecDeque::new()),
            env_exit: code,
            env_runs: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Queue the result of the next captured run.
    pub fn push(self, output: Result<Output>) -> Self {
        self.outputs.lock().expect("lock").push_back(output);
        self
    }

    pub fn env_runs(&self) -> Vec<EnvRun> {
        self.env_runs.lock().expect("lock").clone()
    }

    fn next(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.commands
            .lock()
            .expect("lock")
            .push(format!("{program} {}", args.join(" ")));
        self.outputs
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(ok_output(b"")))
    }
}

impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.next(program, args)
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<Output> {
        self.next(program, args)
    }

    async fn run_with_stdin(&self, program: &str, args: &[&str], _stdin: &[u8]) -> Result<Output> {
        self.next(program, args)
    }

    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &FlatEnv,
        working_dir: Option<&Path>,
    ) -> Result<ExitStatus> {
        self.env_runs.lock().expect("lock").push(EnvRun {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            env: env.clone(),
            working_dir: working_dir.map(Path::to_path_buf),
        });
        Ok(exit_status(self.env_exit))
    }
}

// ── Stage executor ───────────────────────────────────────────────────────────

/// Executor returning exit 0 except for configured stages.
#[derive(Default)]
pub struct MockExecutor {
    exits: BTreeMap<String, (i32, String)>,
    errors: Vec<String>,
    pub executed: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the stage whose name starts with `prefix` exit with `code`.
    pub fn exit(mut self, prefix: &str, code: i32, output: &str) -> Self {
        self.exits
            .insert(prefix.to_string(), (code, output.to_string()));
        self
    }

    /// Make the stage whose name starts with `prefix` run but then fail to
    /// record its transcript.
    pub fn unlogged(mut self, prefix: &str) -> Self {
        self.errors.push(prefix.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().expect("lock").clone()
    }
}

impl StageExecutor for MockExecutor {
    async fn execute(&self, stage: &str, _script: &SecretString) -> Result<StageOutcome> {
        self.executed.lock().expect("lock").push(stage.to_string());
        if self.errors.iter().any(|p| stage.starts_with(p.as_str())) {
            anyhow::bail!("stage {stage} exited 0 but its transcript was not logged");
        }
        let (exit_code, output) = self
            .exits
            .iter()
            .find(|(prefix, _)| stage.starts_with(prefix.as_str()))
            .map_or((0, String::new()), |(_, v)| v.clone());
        Ok(StageOutcome { exit_code, output })
    }
}

// ── Progress reporter ────────────────────────────────────────────────────────

/// Collects reported lines as `step:`, `ok:` and `warn:` entries.
#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lock").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix("warn:").map(str::to_string))
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.lines.lock().expect("lock").push(format!("step:{message}"));
    }

    fn success(&self, message: &str) {
        self.lines.lock().expect("lock").push(format!("ok:{message}"));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().expect("lock").push(format!("warn:{message}"));
    }
}
