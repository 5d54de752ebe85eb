//! Shared test helpers: exit statuses, captured outputs, and configurations.

#![allow(dead_code)]

use std::process::{ExitStatus, Output};

use agenthost_cli::domain::config::{ConfigSource, StackConfig, keys};

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

// ── Configurations ───────────────────────────────────────────────────────────

/// Required inputs only.
pub fn minimal_source() -> ConfigSource {
    ConfigSource::new("dev")
        .with_secret(keys::TAILSCALE_AUTH_KEY, "tskey-auth-test")
        .with_secret(keys::CLAUDE_SETUP_TOKEN, "sk-setup-test")
}

/// Main profile plus agent `alice`, with a main workspace repository.
pub fn source_with_agent() -> ConfigSource {
    minimal_source()
        .with_plain(keys::AGENT_IDS, "alice")
        .with_plain("workspaceRepoUrl", "git@github.com:acme/main-notes.git")
        .with_plain("telegramUserIdAlice", "4242")
}

pub fn config(source: &ConfigSource) -> StackConfig {
    StackConfig::from_source(source).expect("valid test config")
}

pub fn minimal_config() -> StackConfig {
    config(&minimal_source())
}
