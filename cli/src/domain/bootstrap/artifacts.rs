//! Host file contents written by bootstrap stages. Pure functions, no I/O.
//!
//! Each function returns the artifact text; the stage body writes it.

use std::fmt::Write as _;

use crate::domain::bootstrap::{GATEWAY_PORT, LOGIN_USER};

pub const HOME: &str = "/home/ubuntu";
pub const AGENT_CONFIG_DIR: &str = "/home/ubuntu/.openclaw";
pub const AGENT_CONFIG_FILE: &str = "/home/ubuntu/.openclaw/openclaw.json";
pub const GATEWAY_UNIT_NAME: &str = "openclaw-gateway.service";

/// CIDRs the gateway trusts as reverse proxies: loopback and the overlay range.
pub const TRUSTED_PROXIES: &[&str] = &["127.0.0.1/32", "100.64.0.0/10"];

/// A recurring agent job registered through the chat channel.
pub struct ScheduledJob {
    pub name: &'static str,
    pub cron: &'static str,
    pub message: &'static str,
}

pub const SCHEDULED_JOBS: &[ScheduledJob] = &[
    ScheduledJob {
        name: "morning-briefing",
        cron: "0 8 * * *",
        message: "Good morning. Summarize my open tasks and today's priorities.",
    },
    ScheduledJob {
        name: "weekly-review",
        cron: "0 18 * * 5",
        message: "Run the weekly review: what got done, what slipped, what is next.",
    },
];

/// Single-quote `value` for bash.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Generate the gateway systemd unit.
#[must_use]
pub fn gateway_unit() -> String {
    let mut out = String::new();
    out.push_str("[Unit]\n");
    out.push_str("Description=OpenClaw gateway\n");
    out.push_str("After=network-online.target tailscaled.service\n");
    out.push_str("Wants=network-online.target\n");
    out.push_str("StartLimitIntervalSec=300\n");
    out.push_str("StartLimitBurst=3\n");
    out.push('\n');
    out.push_str("[Service]\n");
    out.push_str("Type=simple\n");
    let _ = writeln!(out, "User={LOGIN_USER}");
    let _ = writeln!(out, "WorkingDirectory={HOME}");
    let _ = writeln!(out, "Environment=HOME={HOME}");
    let _ = writeln!(out, "ExecStart=/usr/bin/openclaw gateway --port {GATEWAY_PORT}");
    out.push_str("Restart=always\n");
    out.push_str("RestartSec=5\n");
    out.push('\n');
    out.push_str("NoNewPrivileges=true\n");
    out.push_str("PrivateTmp=true\n");
    out.push('\n');
    out.push_str("[Install]\n");
    out.push_str("WantedBy=multi-user.target\n");
    out
}

/// jq filter merging gateway settings into the agent config.
///
/// Expects `--rawfile token <path>`.
#[must_use]
pub fn gateway_config_filter() -> String {
    let proxies = TRUSTED_PROXIES
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    [
        "  .gateway.mode = \"local\"".to_string(),
        "| .gateway.bind = \"loopback\"".to_string(),
        format!("| .gateway.port = {GATEWAY_PORT}"),
        "| .gateway.auth.mode = \"token\"".to_string(),
        "| .gateway.auth.token = ($token | rtrimstr(\"\\n\"))".to_string(),
        format!("| .gateway.trustedProxies = [{proxies}]"),
        "| .gateway.controlUi.allowInsecureAuth = false".to_string(),
        "| .gateway.controlUi.dangerouslyDisableDeviceAuth = false".to_string(),
    ]
    .join("\n")
}

/// jq filter enabling the Telegram channel with a single-user allowlist.
///
/// Expects `--rawfile bot <path> --arg user <id> --arg group <id>`.
#[must_use]
pub fn telegram_channel_filter() -> &'static str {
    concat!(
        "  .channels.telegram.enabled = true\n",
        "| .channels.telegram.botToken = ($bot | rtrimstr(\"\\n\"))\n",
        "| .channels.telegram.dmPolicy = \"allowlist\"\n",
        "| .channels.telegram.allowFrom = [$user]\n",
        "| if $group != \"\" then .channels.telegram.groups[$group] = {\"requireMention\": true} else . end",
    )
}

/// Git remote split into host and repository path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRemote {
    pub host: String,
    pub path: String,
}

impl RepoRemote {
    /// Parse `git@host:path`, `ssh://git@host/path` or `https://host/path`.
    ///
    /// Returns `None` for anything else, or for characters unsafe to embed
    /// in shell or ssh config text.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let (host, path) = if let Some(rest) = url.strip_prefix("git@") {
            rest.split_once(':')?
        } else if let Some(rest) = url.strip_prefix("ssh://") {
            let rest = rest.strip_prefix("git@").unwrap_or(rest);
            rest.split_once('/')?
        } else if let Some(rest) = url.strip_prefix("https://") {
            rest.split_once('/')?
        } else {
            return None;
        };
        let path = path.trim_end_matches('/');
        let host_ok = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        let path_ok = !path.is_empty()
            && !path.starts_with('/')
            && !path.contains("..")
            && path
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));
        (host_ok && path_ok).then(|| Self {
            host: host.to_string(),
            path: path.to_string(),
        })
    }

    /// SSH remote that routes through the profile's host alias.
    #[must_use]
    pub fn via_alias(&self, alias: &str) -> String {
        format!("git@{alias}:{}", self.path)
    }
}

/// Paths and names one profile's workspace uses on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub label: String,
    pub dir: String,
    pub key_path: String,
    pub ssh_alias: String,
    pub cron_file: String,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn for_profile(label: &str, is_main: bool) -> Self {
        let dir = if is_main {
            format!("{AGENT_CONFIG_DIR}/workspace")
        } else {
            format!("{AGENT_CONFIG_DIR}/workspace-{label}")
        };
        Self {
            label: label.to_string(),
            dir,
            key_path: format!("{HOME}/.ssh/workspace_{label}_ed25519"),
            ssh_alias: format!("workspace-{label}"),
            cron_file: format!("/etc/cron.d/agenthost-workspace-sync-{label}"),
        }
    }

    /// Minute past the hour for the sync job, spread by label.
    #[must_use]
    pub fn cron_minute(&self) -> u32 {
        self.label.bytes().map(u32::from).sum::<u32>() % 60
    }
}

/// `~/.ssh/config.d` block pinning the deploy key to the alias host.
#[must_use]
pub fn ssh_host_block(layout: &WorkspaceLayout, remote: &RepoRemote) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Host {}", layout.ssh_alias);
    let _ = writeln!(out, "    HostName {}", remote.host);
    out.push_str("    User git\n");
    let _ = writeln!(out, "    IdentityFile {}", layout.key_path);
    out.push_str("    IdentitiesOnly yes\n");
    out
}

/// `/etc/cron.d` entry syncing the workspace hourly with random jitter.
///
/// `%` is escaped because cron treats it as a newline.
#[must_use]
pub fn sync_cron(layout: &WorkspaceLayout) -> String {
    let mut out = String::new();
    out.push_str("SHELL=/bin/bash\n");
    out.push_str("PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin\n");
    let _ = writeln!(
        out,
        "{minute} * * * * {LOGIN_USER} sleep $((RANDOM \\% 300)) && cd {dir} && git add -A && {{ git commit -q -m \"Auto-sync $(date -u +\\%Y-\\%m-\\%dT\\%H:\\%M:\\%SZ)\" || true; }} && git pull -q --rebase origin main && git push -q origin main",
        minute = layout.cron_minute(),
        dir = layout.dir,
    );
    out
}
