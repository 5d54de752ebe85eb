//! Human-readable terminal renderer.
//!
//! Command results (tables, dotenv, scripts) go to stdout. Status lines go
//! through `OutputContext` on stderr.

use std::collections::BTreeMap;

use agenthost_common::{FlatEnv, REDACTED, SecretString};
use owo_colors::OwoColorize as _;

use crate::application::services::realize::NodeStatus;
use crate::application::services::stack::UpOutcome;
use crate::domain::bootstrap::StartupPayload;
use crate::domain::outputs::StackOutputs;
use crate::domain::plan::{NodePlan, PlannedAction};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        println!("agenthost {version}");
    }

    /// Render the per-node plan followed by a one-line summary.
    pub fn render_preview(&self, stack: &str, plans: &[NodePlan]) {
        self.ctx.header(&format!("Stack {stack}"));
        let width = plans.iter().map(|p| p.name.len()).max().unwrap_or(0);
        for plan in plans {
            let label = format!("{} {:<10}", action_symbol(plan.action), plan.action.to_string());
            println!(
                "  {}  {:<width$}",
                label.style(self.ctx.styles.action(plan.action)),
                plan.name
            );
        }
        self.ctx.info(&summarize(plans));
    }

    /// Render the result of `up`: one line per node, then the problems.
    pub fn render_up(&self, stack: &str, outcome: &UpOutcome, outputs: &StackOutputs) {
        if outcome.report.is_success() {
            self.ctx.success(&format!("Stack {stack} is up"));
        } else {
            self.ctx.error(&format!("Stack {stack} is incomplete"));
        }
        for (name, status) in &outcome.report.nodes {
            match status {
                NodeStatus::Done(action) => {
                    println!("  {:<28} {}", name, action.style(self.ctx.styles.action(*action)));
                }
                NodeStatus::Failed(e) => {
                    println!("  {:<28} {}", name, "failed".style(self.ctx.styles.error));
                    self.ctx.error(&e.to_string());
                }
                NodeStatus::Skipped(e) => {
                    println!("  {:<28} {}", name, "skipped".style(self.ctx.styles.dim));
                    self.ctx.warn(&e.to_string());
                }
            }
        }
        if !outcome.report.is_success() {
            return;
        }
        if outcome.provisioned {
            self.ctx.success("Host provisioned");
        }
        if let Some(ip) = &outputs.ipv4_address {
            self.ctx.info(&format!("Server address: {ip}"));
        }
        self.ctx.info(&format!("Gateway: {}", outputs.tailscale_url));
        self.ctx.info("Run: agenthost outputs --show-secrets");
    }

    pub fn render_outputs(&self, outputs: &StackOutputs, show_secrets: bool) {
        let plain = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let secret = |v: &Option<SecretString>| display_secret(v.as_ref(), show_secrets);

        let rows = [
            ("Server ID", plain(&outputs.server_id)),
            ("IPv4", plain(&outputs.ipv4_address)),
            ("IPv6", plain(&outputs.ipv6_address)),
            ("Status", plain(&outputs.server_status)),
            ("SSH key ID", plain(&outputs.ssh_key_id)),
            ("Firewall ID", plain(&outputs.firewall_id)),
            ("Gateway token", secret(&outputs.gateway_token)),
            ("Tailscale host", outputs.tailscale_hostname.clone()),
            ("Tailscale URL", outputs.tailscale_url.clone()),
            ("URL with token", secret(&outputs.tailscale_url_with_token)),
        ];
        for (key, value) in rows {
            println!("{:<16} {value}", format!("{key}:").style(self.ctx.styles.dim));
        }

        if !outputs.agent_workspace_keys.is_empty() {
            println!();
            println!("{}", "Workspace deploy keys:".style(self.ctx.styles.bold));
            for (label, key) in &outputs.agent_workspace_keys {
                println!("  {label}: {}", key.public_key.as_deref().unwrap_or("-"));
                if show_secrets && let Some(private) = &key.private_key {
                    print!("{}", with_trailing_newline(private.expose_secret()));
                }
            }
        }

        if show_secrets && let Some(private) = &outputs.ssh_private_key {
            println!();
            println!("{}", "Host SSH private key:".style(self.ctx.styles.bold));
            print!("{}", with_trailing_newline(private.expose_secret()));
        }
    }

    /// Print the projected environment as a dotenv document.
    pub fn render_env(&self, env: &FlatEnv, show_secrets: bool) {
        print!("{}", env.to_dotenv(show_secrets));
        if !show_secrets {
            self.ctx
                .info("Secret values are redacted; pass --show-secrets to include them");
        }
    }

    pub fn render_bootstrap(&self, payload: &StartupPayload, show_secrets: bool) {
        let script = if show_secrets {
            payload.script.expose_secret()
        } else {
            payload.redacted.as_str()
        };
        print!("{}", with_trailing_newline(script));
        self.ctx
            .info(&format!("{} bytes of user data", payload.script.len()));
    }
}

/// Column marker for a planned action.
#[must_use]
pub fn action_symbol(action: PlannedAction) -> &'static str {
    match action {
        PlannedAction::Create => "+",
        PlannedAction::Update => "~",
        PlannedAction::Replace => "±",
        PlannedAction::Regenerate => "*",
        PlannedAction::Pending => "?",
        PlannedAction::Same => " ",
    }
}

/// `"1 to create, 2 unchanged"`, counted per action in a fixed order.
#[must_use]
pub fn summarize(plans: &[NodePlan]) -> String {
    let mut counts: BTreeMap<u8, (usize, &str)> = BTreeMap::new();
    for plan in plans {
        let (order, label) = match plan.action {
            PlannedAction::Create => (0, "to create"),
            PlannedAction::Update => (1, "to update"),
            PlannedAction::Replace => (2, "to replace"),
            PlannedAction::Regenerate => (3, "to regenerate"),
            PlannedAction::Pending => (4, "pending"),
            PlannedAction::Same => (5, "unchanged"),
        };
        counts.entry(order).or_insert((0, label)).0 += 1;
    }
    if counts.is_empty() {
        return "no resources".to_string();
    }
    counts
        .values()
        .map(|(n, label)| format!("{n} {label}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A secret for display: the value, the redaction marker, or `-` when unset.
#[must_use]
pub fn display_secret(value: Option<&SecretString>, show_secrets: bool) -> String {
    match value {
        Some(v) if show_secrets => v.expose_secret().to_string(),
        Some(_) => REDACTED.to_string(),
        None => "-".to_string(),
    }
}

fn with_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}
