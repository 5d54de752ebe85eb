//! Build outputs read back from stack state.

use agenthost_common::{MAIN_PROFILE, REDACTED, SecretString};
use serde_json::{Map, Value, json};

use crate::domain::config::StackConfig;
use crate::domain::stack::{FIREWALL, GATEWAY_TOKEN, SERVER, SSH_KEY, SSH_PRIVATE_KEY, keys};
use crate::domain::state::StackState;

/// Shown in place of the tailnet when `tailnetDnsName` is unset.
pub const TAILNET_PLACEHOLDER: &str = "<your-tailnet>.ts.net";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceKeyOutput {
    pub public_key: Option<String>,
    pub private_key: Option<SecretString>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackOutputs {
    pub server_id: Option<String>,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub server_status: Option<String>,
    pub ssh_key_id: Option<String>,
    pub ssh_private_key: Option<SecretString>,
    pub firewall_id: Option<String>,
    pub gateway_token: Option<SecretString>,
    /// Profile label to deploy key, main first.
    pub agent_workspace_keys: Vec<(String, WorkspaceKeyOutput)>,
    pub tailscale_hostname: String,
    pub tailscale_url: String,
    pub tailscale_url_with_token: Option<SecretString>,
}

impl StackOutputs {
    #[must_use]
    pub fn collect(state: &StackState, config: &StackConfig) -> Self {
        let plain = |node: &str, key: &str| state.output(node, key).map(|v| v.expose().to_string());
        let secret = |node: &str, key: &str| state.output(node, key).map(|v| v.to_secret());

        let hostname = config.server.name.clone();
        let tailnet = config
            .tailnet_dns_name
            .clone()
            .unwrap_or_else(|| TAILNET_PLACEHOLDER.to_string());
        let tailscale_url = format!("https://{hostname}.{tailnet}/");
        let gateway_token = secret(GATEWAY_TOKEN, keys::RESULT);
        let tailscale_url_with_token = gateway_token.as_ref().map(|t| {
            SecretString::new(format!("{tailscale_url}?token={}", t.expose_secret()))
        });

        let agent_workspace_keys = config
            .profiles()
            .map(|p| {
                let node = p.deploy_key_name();
                (
                    p.label().to_string(),
                    WorkspaceKeyOutput {
                        public_key: plain(&node, keys::PUBLIC_KEY),
                        private_key: secret(&node, keys::PRIVATE_KEY),
                    },
                )
            })
            .collect();

        Self {
            server_id: state.provider_id(SERVER).map(str::to_string),
            ipv4_address: plain(SERVER, keys::IPV4),
            ipv6_address: plain(SERVER, keys::IPV6),
            server_status: plain(SERVER, keys::STATUS),
            ssh_key_id: state.provider_id(SSH_KEY).map(str::to_string),
            ssh_private_key: secret(SSH_PRIVATE_KEY, keys::PRIVATE_KEY),
            firewall_id: state.provider_id(FIREWALL).map(str::to_string),
            gateway_token,
            agent_workspace_keys,
            tailscale_hostname: hostname,
            tailscale_url,
            tailscale_url_with_token,
        }
    }

    /// The main profile's deploy key, kept under its own names for older
    /// consumers.
    #[must_use]
    pub fn main_workspace_key(&self) -> Option<&WorkspaceKeyOutput> {
        self.agent_workspace_keys
            .iter()
            .find(|(label, _)| label == MAIN_PROFILE)
            .map(|(_, key)| key)
    }

    /// JSON object with camelCase keys; secrets redacted unless asked.
    #[must_use]
    pub fn to_json(&self, show_secrets: bool) -> Value {
        let s = |v: &Option<SecretString>| -> Value {
            match v {
                Some(secret) if show_secrets => json!(secret.expose_secret()),
                Some(_) => json!(REDACTED),
                None => Value::Null,
            }
        };
        let mut agent_keys = Map::new();
        for (label, key) in &self.agent_workspace_keys {
            agent_keys.insert(
                label.clone(),
                json!({ "publicKey": key.public_key, "privateKey": s(&key.private_key) }),
            );
        }
        let main = self.main_workspace_key().cloned().unwrap_or_default();
        json!({
            "serverId": self.server_id,
            "ipv4Address": self.ipv4_address,
            "ipv6Address": self.ipv6_address,
            "serverStatus": self.server_status,
            "sshKeyId": self.ssh_key_id,
            "sshPrivateKey": s(&self.ssh_private_key),
            "firewallId": self.firewall_id,
            "gatewayToken": s(&self.gateway_token),
            "workspaceDeployPublicKey": main.public_key,
            "workspaceDeployPrivateKey": s(&main.private_key),
            "agentWorkspaceKeys": agent_keys,
            "tailscaleHostname": self.tailscale_hostname,
            "tailscaleUrl": self.tailscale_url,
            "tailscaleUrlWithToken": s(&self.tailscale_url_with_token),
        })
    }
}
