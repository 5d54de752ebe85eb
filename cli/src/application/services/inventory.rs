//! Application service: dynamic inventory host resolution.

use std::time::Duration;

use serde_json::Value;

use crate::application::ports::CommandRunner;
use crate::domain::inventory;

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve the address Ansible should use for `hostname`.
///
/// The overlay status is optional: a missing `tailscale` binary or an
/// unparsable reply falls back to name-based resolution.
pub async fn resolve_host(
    runner: &impl CommandRunner,
    override_host: Option<&str>,
    hostname: &str,
) -> String {
    if override_host.is_some_and(|h| !h.trim().is_empty()) {
        return inventory::resolve_host(override_host, hostname, None);
    }
    let status = overlay_status(runner).await;
    inventory::resolve_host(None, hostname, status.as_ref())
}

async fn overlay_status(runner: &impl CommandRunner) -> Option<Value> {
    let output = match runner
        .run_with_timeout("tailscale", &["status", "--json"], STATUS_TIMEOUT)
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(error = %e, "tailscale status unavailable");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(status = %output.status, "tailscale status failed");
        return None;
    }
    serde_json::from_slice(&output.stdout)
        .inspect_err(|e| tracing::debug!(error = %e, "tailscale status is not JSON"))
        .ok()
}
