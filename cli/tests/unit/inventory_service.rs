//! Tests for inventory host resolution through the command runner.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use agenthost_cli::application::services::inventory::resolve_host;

use crate::helpers::{err_output, ok_output};
use crate::mocks::MockRunner;

const STATUS: &[u8] = br#"{
    "MagicDNSSuffix": "tail1234.ts.net",
    "Peer": {
        "nodekey:abc": { "HostName": "openclaw-vps", "TailscaleIPs": ["fd7a:115c::5", "100.101.102.103"] },
        "nodekey:def": { "HostName": "laptop", "TailscaleIPs": ["100.64.0.9"] }
    }
}"#;

#[tokio::test]
async fn test_override_skips_tailscale() {
    let runner = MockRunner::new();
    let host = resolve_host(&runner, Some("10.0.0.5"), "openclaw-vps").await;
    assert_eq!(host, "10.0.0.5");
    assert!(runner.commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_peer_ipv4_is_preferred() {
    let runner = MockRunner::new().push(Ok(ok_output(STATUS)));
    let host = resolve_host(&runner, None, "openclaw-vps").await;
    assert_eq!(host, "100.101.102.103");
    assert_eq!(
        runner.commands.lock().unwrap().as_slice(),
        ["tailscale status --json"]
    );
}

#[tokio::test]
async fn test_unknown_peer_uses_magic_dns() {
    let runner = MockRunner::new().push(Ok(ok_output(STATUS)));
    let host = resolve_host(&runner, None, "other-host").await;
    assert_eq!(host, "other-host.tail1234.ts.net");
}

#[tokio::test]
async fn test_tailscale_failures_fall_back_to_hostname() {
    let failing = MockRunner::new().push(Ok(err_output(1, b"not logged in")));
    assert_eq!(resolve_host(&failing, None, "openclaw-vps").await, "openclaw-vps");

    let missing = MockRunner::new().push(Err(anyhow::anyhow!("failed to spawn tailscale")));
    assert_eq!(resolve_host(&missing, None, "openclaw-vps").await, "openclaw-vps");

    let garbage = MockRunner::new().push(Ok(ok_output(b"not json")));
    assert_eq!(resolve_host(&garbage, None, "openclaw-vps").await, "openclaw-vps");
}
