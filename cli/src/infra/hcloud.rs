//! Hetzner Cloud implementation of the `CloudProvider` port.

use std::time::Duration;

use agenthost_common::SecretString;
use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::application::ports::{CloudProvider, ProviderResource};
use crate::domain::graph::{ResolvedServer, ResolvedSshKey};
use crate::domain::network::NetworkPolicy;
use crate::domain::stack::keys;

pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";
/// Overrides the API base URL.
pub const ENDPOINT_ENV: &str = "HCLOUD_ENDPOINT";
pub const TOKEN_ENV: &str = "HCLOUD_TOKEN";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval between polls of a running action.
const ACTION_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Polls before a running action counts as stuck.
const ACTION_POLL_ATTEMPTS: u32 = 300;

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct FirewallEnvelope {
    firewall: IdOnly,
}

#[derive(Debug, Deserialize)]
struct SshKeyEnvelope {
    ssh_key: IdOnly,
}

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ServerBody,
}

#[derive(Debug, Deserialize)]
struct ServerBody {
    id: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    public_net: PublicNet,
}

#[derive(Debug, Default, Deserialize)]
struct PublicNet {
    ipv4: Option<IpEntry>,
    ipv6: Option<IpEntry>,
}

#[derive(Debug, Deserialize)]
struct IpEntry {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: ActionBody,
}

#[derive(Debug, Deserialize)]
struct ActionBody {
    id: u64,
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
}

impl ActionBody {
    /// `true` once the action succeeded; an action that failed is an error.
    fn finished(&self) -> Result<bool> {
        match self.status.as_str() {
            "success" => Ok(true),
            "error" => {
                let reason = self.error.as_ref().map_or_else(
                    || "no reason given".to_string(),
                    |e| format!("{}: {}", e.code, e.message),
                );
                anyhow::bail!("action {} failed: {reason}", self.id)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

fn server_resource(server: ServerBody) -> ProviderResource {
    let mut resource =
        ProviderResource::new(server.id.to_string()).with_attribute(keys::STATUS, server.status);
    if let Some(v4) = server.public_net.ipv4 {
        resource = resource.with_attribute(keys::IPV4, v4.ip);
    }
    if let Some(v6) = server.public_net.ipv6 {
        resource = resource.with_attribute(keys::IPV6, v6.ip);
    }
    resource
}

/// Render a failed response as `<code>: <message>` when the body allows.
fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(e) => format!("{status} {}: {}", e.error.code, e.error.message),
        Err(_) => format!("{status} {body}"),
    }
}

/// Hetzner Cloud REST client.
pub struct HcloudProvider {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    action_poll: Duration,
}

impl HcloudProvider {
    /// Build a client for `base_url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("agenthost/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            action_poll: ACTION_POLL_INTERVAL,
        })
    }

    /// Poll running actions at `interval` instead of every second.
    #[must_use]
    pub fn with_action_poll(mut self, interval: Duration) -> Self {
        self.action_poll = interval;
        self
    }

    /// Token from config, else `HCLOUD_TOKEN`; endpoint from
    /// `HCLOUD_ENDPOINT`, else the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available.
    pub fn from_env(config_token: Option<&SecretString>) -> Result<Self> {
        let token = config_token
            .cloned()
            .or_else(|| std::env::var(TOKEN_ENV).ok().map(SecretString::new))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no Hetzner API token: set {TOKEN_ENV} or config `hcloudToken: {{ secret: ... }}`"
                )
            })?;
        let endpoint =
            std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint, token)
    }

    /// Send a request; `Ok(None)` on 404.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<String>> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%method, %url, "hcloud request");
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(self.token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("{method} {path}"))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::error!(%method, %path, %status, "hcloud request failed");
            anyhow::bail!("{method} {path} failed: {}", describe_error(status, &text));
        }
        Ok(Some(text))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        match self.send(method, path, body).await? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .with_context(|| format!("parsing response of {path}")),
            None => Ok(None),
        }
    }

    /// Wait until `action` has finished.
    async fn await_action(&self, mut action: ActionBody) -> Result<()> {
        for _ in 0..ACTION_POLL_ATTEMPTS {
            if action.finished()? {
                return Ok(());
            }
            tokio::time::sleep(self.action_poll).await;
            let path = format!("/actions/{}", action.id);
            let polled: ActionEnvelope = self
                .send_json(Method::GET, &path, None)
                .await?
                .with_context(|| format!("{path} returned 404"))?;
            action = polled.action;
        }
        anyhow::bail!(
            "action {} still running after {ACTION_POLL_ATTEMPTS} polls",
            action.id
        )
    }

    async fn required<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<T> {
        self.send_json(method, path, Some(body))
            .await?
            .with_context(|| format!("{path} returned 404"))
    }
}

impl CloudProvider for HcloudProvider {
    async fn create_firewall(&self, policy: &NetworkPolicy) -> Result<ProviderResource> {
        let body = serde_json::to_value(policy).context("encoding firewall")?;
        let created: FirewallEnvelope = self.required(Method::POST, "/firewalls", &body).await?;
        Ok(ProviderResource::new(created.firewall.id.to_string()))
    }

    async fn read_firewall(&self, id: &str) -> Result<Option<ProviderResource>> {
        let found: Option<FirewallEnvelope> = self
            .send_json(Method::GET, &format!("/firewalls/{id}"), None)
            .await?;
        Ok(found.map(|f| ProviderResource::new(f.firewall.id.to_string())))
    }

    async fn update_firewall_rules(&self, id: &str, policy: &NetworkPolicy) -> Result<()> {
        let body = json!({ "rules": policy.rules() });
        self.send(
            Method::POST,
            &format!("/firewalls/{id}/actions/set_rules"),
            Some(&body),
        )
        .await?
        .with_context(|| format!("firewall {id} not found"))?;
        Ok(())
    }

    async fn create_ssh_key(&self, key: &ResolvedSshKey) -> Result<ProviderResource> {
        let body = json!({
            "name": key.name,
            "public_key": key.public_key,
            "labels": key.labels,
        });
        let created: SshKeyEnvelope = self.required(Method::POST, "/ssh_keys", &body).await?;
        Ok(ProviderResource::new(created.ssh_key.id.to_string()))
    }

    async fn read_ssh_key(&self, id: &str) -> Result<Option<ProviderResource>> {
        let found: Option<SshKeyEnvelope> = self
            .send_json(Method::GET, &format!("/ssh_keys/{id}"), None)
            .await?;
        Ok(found.map(|k| ProviderResource::new(k.ssh_key.id.to_string())))
    }

    async fn delete_ssh_key(&self, id: &str) -> Result<()> {
        self.send(Method::DELETE, &format!("/ssh_keys/{id}"), None)
            .await?;
        Ok(())
    }

    async fn create_server(&self, server: &ResolvedServer) -> Result<ProviderResource> {
        let body = json!({
            "name": server.name,
            "server_type": server.server_type,
            "location": server.location,
            "image": server.image,
            "ssh_keys": [server.ssh_key_id],
            "firewalls": [{ "firewall": server.firewall_id }],
            "user_data": server.user_data().expose_secret(),
            "labels": server.labels,
            "start_after_create": true,
        });
        let created: ServerEnvelope = self.required(Method::POST, "/servers", &body).await?;
        Ok(server_resource(created.server))
    }

    async fn read_server(&self, id: &str) -> Result<Option<ProviderResource>> {
        let found: Option<ServerEnvelope> = self
            .send_json(Method::GET, &format!("/servers/{id}"), None)
            .await?;
        Ok(found.map(|s| server_resource(s.server)))
    }

    async fn delete_server(&self, id: &str) -> Result<()> {
        let deleting: Option<ActionEnvelope> = self
            .send_json(Method::DELETE, &format!("/servers/{id}"), None)
            .await?;
        match deleting {
            Some(envelope) => {
                tracing::debug!(server = %id, action = envelope.action.id, "waiting for delete");
                self.await_action(envelope.action)
                    .await
                    .with_context(|| format!("deleting server {id}"))
            }
            None => Ok(()),
        }
    }
}
