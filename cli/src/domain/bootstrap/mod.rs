//! First-boot bootstrap: ordered stages with per-stage idempotence guards
//! and failure policies.
//!
//! `stages::sequence` builds a `BootstrapPlan` from the flat environment;
//! `render::render` turns it into the startup payload. Both are pure.

use std::fmt;

use agenthost_common::SecretString;

pub mod artifacts;
pub mod render;
pub mod stages;

pub use render::{StartupPayload, render, render_stage_script};
pub use stages::{sequence, sequence_with};

// ── Constants ────────────────────────────────────────────────────────────────

/// Durable transcript of every bootstrap run on the host.
pub const BOOTSTRAP_LOG: &str = "/var/log/agenthost-bootstrap.log";
/// Owner-only directory holding secret files while a stage runs.
pub const SECRET_DIR: &str = "/run/agenthost";
/// Login user the agent runs as.
pub const LOGIN_USER: &str = "ubuntu";
/// Loopback port of the agent gateway.
pub const GATEWAY_PORT: u16 = 18789;
/// Output fragment that marks the expected onboarding failure.
pub const ONBOARD_EXPECTED_ERROR: &str = "gateway closed";

// ── Stage model ──────────────────────────────────────────────────────────────

/// Which step of the sequence a stage implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    CreateUser,
    InstallOverlay,
    JoinOverlay,
    HostFirewall,
    RuntimeDeps,
    OnboardAgent,
    SetupToken,
    GatewayConfig,
    GatewayService,
    Readiness,
    ExternalAccess,
    ChatChannels,
    WorkspaceSetup,
    WorkspacePush,
}

impl StageKind {
    /// Stage name; per-profile stages append `-<profile>`.
    #[must_use]
    pub fn base_name(self) -> &'static str {
        match self {
            Self::CreateUser => "create-user",
            Self::InstallOverlay => "install-overlay",
            Self::JoinOverlay => "join-overlay",
            Self::HostFirewall => "host-firewall",
            Self::RuntimeDeps => "runtime-deps",
            Self::OnboardAgent => "onboard-agent",
            Self::SetupToken => "setup-token",
            Self::GatewayConfig => "gateway-config",
            Self::GatewayService => "gateway-service",
            Self::Readiness => "readiness",
            Self::ExternalAccess => "external-access",
            Self::ChatChannels => "chat-channels",
            Self::WorkspaceSetup => "workspace-setup",
            Self::WorkspacePush => "workspace-push",
        }
    }
}

/// Idempotence guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Skip the stage when this shell probe succeeds.
    SkipWhen(String),
    /// Safe to run again as-is.
    Reentrant,
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipWhen(probe) => write!(f, "skip-when {probe}"),
            Self::Reentrant => f.write_str("reentrant"),
        }
    }
}

/// What a stage failure means for the rest of the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    Fatal,
    /// Fatal unless the stage output contains the pattern.
    FatalUnlessExpected(String),
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => f.write_str("fatal"),
            Self::FatalUnlessExpected(p) => write!(f, "fatal-unless-expected-error:{p}"),
            Self::BestEffort => f.write_str("best-effort"),
        }
    }
}

/// Result of running one stage body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub output: String,
}

impl StageOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Policy decision for a finished stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Succeeded,
    /// Failed with the expected error; treated as success.
    ExpectedFailure,
    /// Failed, but the stage is best-effort.
    Tolerated,
    /// Failed fatally; no later stage runs.
    Abort,
}

impl Disposition {
    #[must_use]
    pub fn continues(self) -> bool {
        !matches!(self, Self::Abort)
    }
}

impl FailurePolicy {
    /// Decide how the sequence proceeds after `outcome`.
    ///
    /// The rendered `run_stage` shell helper implements the same table.
    #[must_use]
    pub fn disposition(&self, outcome: &StageOutcome) -> Disposition {
        if outcome.success() {
            return Disposition::Succeeded;
        }
        match self {
            Self::BestEffort => Disposition::Tolerated,
            Self::FatalUnlessExpected(pattern) if outcome.output.contains(pattern.as_str()) => {
                Disposition::ExpectedFailure
            }
            Self::Fatal | Self::FatalUnlessExpected(_) => Disposition::Abort,
        }
    }
}

/// A secret handed to a stage through an owner-only file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretInput {
    /// Directory holding the file, [`SECRET_DIR`] on a real host.
    pub dir: String,
    pub file: String,
    pub value: SecretString,
}

impl SecretInput {
    #[must_use]
    pub fn new(file: impl Into<String>, value: SecretString) -> Self {
        Self::in_dir(SECRET_DIR, file, value)
    }

    #[must_use]
    pub fn in_dir(dir: impl Into<String>, file: impl Into<String>, value: SecretString) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
            value,
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.dir, self.file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapStage {
    pub kind: StageKind,
    pub name: String,
    pub guard: Guard,
    pub policy: FailurePolicy,
    pub secrets: Vec<SecretInput>,
    /// Bash body. Secret values never appear here, only their file paths.
    pub body: String,
}

/// Ordered stages for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub hostname: String,
    pub stages: Vec<BootstrapStage>,
}

impl BootstrapPlan {
    /// Index of the first stage of `kind`.
    #[must_use]
    pub fn position(&self, kind: StageKind) -> Option<usize> {
        self.stages.iter().position(|s| s.kind == kind)
    }

    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&BootstrapStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }
}
