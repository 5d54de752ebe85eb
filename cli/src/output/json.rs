//! JSON output for `--json` mode.
//!
//! Every command prints exactly one pretty-printed JSON document on stdout.
//! Failures print the error object from `format_error` instead.

use agenthost_common::FlatEnv;
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::application::services::realize::NodeStatus;
use crate::application::services::stack::UpOutcome;
use crate::domain::bootstrap::StartupPayload;
use crate::domain::error::{BootstrapError, ConfigError, GraphError, PolicyError, ProjectionError};
use crate::domain::outputs::StackOutputs;
use crate::domain::plan::NodePlan;

/// Format the JSON error object.
///
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable code for the first typed error in `err`'s chain.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.is::<ConfigError>() {
            return "config";
        }
        if cause.is::<GraphError>() {
            return "graph";
        }
        if cause.is::<ProjectionError>() {
            return "projection";
        }
        if cause.is::<BootstrapError>() {
            return "bootstrap";
        }
        if cause.is::<PolicyError>() {
            return "policy";
        }
    }
    "error"
}

fn print(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}

/// `{"name", "status", "action"?, "error"?}` for one realized node.
#[must_use]
pub fn node_status_json(name: &str, status: &NodeStatus) -> Value {
    match status {
        NodeStatus::Done(action) => json!({ "name": name, "status": "done", "action": action }),
        NodeStatus::Failed(e) => json!({ "name": name, "status": "failed", "error": e.to_string() }),
        NodeStatus::Skipped(e) => {
            json!({ "name": name, "status": "skipped", "error": e.to_string() })
        }
    }
}

/// Renders command results as JSON documents on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        print(&json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_preview(&self, stack: &str, plans: &[NodePlan]) -> Result<()> {
        let changes = plans.iter().filter(|p| p.action.is_change()).count();
        print(&json!({
            "stack": stack,
            "changes": changes,
            "resources": plans,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_up(&self, stack: &str, outcome: &UpOutcome, outputs: &StackOutputs) -> Result<()> {
        let resources: Vec<Value> = outcome
            .report
            .nodes
            .iter()
            .map(|(name, status)| node_status_json(name, status))
            .collect();
        print(&json!({
            "stack": stack,
            "success": outcome.report.is_success(),
            "provisioned": outcome.provisioned,
            "resources": resources,
            "outputs": outputs.to_json(false),
        }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_outputs(&self, outputs: &StackOutputs, show_secrets: bool) -> Result<()> {
        print(&outputs.to_json(show_secrets))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_env(&self, env: &FlatEnv, show_secrets: bool) -> Result<()> {
        let map: Map<String, Value> = env
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.display(show_secrets).to_string())))
            .collect();
        print(&Value::Object(map))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_bootstrap(&self, payload: &StartupPayload, show_secrets: bool) -> Result<()> {
        let script = if show_secrets {
            payload.script.expose_secret()
        } else {
            payload.redacted.as_str()
        };
        print(&json!({
            "bytes": payload.script.len(),
            "script": script,
        }))
    }
}
