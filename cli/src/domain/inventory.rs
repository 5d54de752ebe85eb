//! Dynamic Ansible inventory for the single overlay-reachable host.

use serde_json::{Value, json};

use crate::domain::bootstrap::LOGIN_USER;

pub const INVENTORY_GROUP: &str = "openclaw";

/// SSH options for a host whose key changes on every replacement.
const SSH_COMMON_ARGS: &str = "-o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null";

/// Pick the address Ansible connects to.
///
/// Order: explicit override, the overlay IP of the peer whose `HostName`
/// matches (IPv4 preferred), `<hostname>.<MagicDNSSuffix>`, the bare name.
#[must_use]
pub fn resolve_host(override_host: Option<&str>, hostname: &str, status: Option<&Value>) -> String {
    if let Some(host) = override_host.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    let Some(status) = status else {
        return hostname.to_string();
    };
    if let Some(ip) = peer_ip(status, hostname) {
        return ip;
    }
    match status.get("MagicDNSSuffix").and_then(Value::as_str) {
        Some(suffix) if !suffix.is_empty() => format!("{hostname}.{suffix}"),
        _ => hostname.to_string(),
    }
}

fn peer_ip(status: &Value, hostname: &str) -> Option<String> {
    let peers = status.get("Peer")?.as_object()?;
    let peer = peers.values().find(|p| {
        p.get("HostName")
            .and_then(Value::as_str)
            .is_some_and(|h| h.eq_ignore_ascii_case(hostname))
    })?;
    let addrs: Vec<&str> = peer
        .get("TailscaleIPs")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    addrs
        .iter()
        .find(|a| a.contains('.'))
        .or_else(|| addrs.first())
        .map(|a| (*a).to_string())
}

/// `--list` output.
#[must_use]
pub fn list(host: &str) -> Value {
    json!({
        INVENTORY_GROUP: { "hosts": [host] },
        "_meta": {
            "hostvars": {
                host: {
                    "ansible_user": LOGIN_USER,
                    "ansible_ssh_common_args": SSH_COMMON_ARGS,
                }
            }
        }
    })
}

/// `--host` output. Host variables are already in `_meta` of the list.
#[must_use]
pub fn host_vars() -> Value {
    json!({})
}
