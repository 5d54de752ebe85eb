//! The agent host stack: which resources exist and how they feed each other.

use std::collections::BTreeMap;

use agenthost_common::SecretString;

use crate::domain::bootstrap::{BootstrapPlan, StartupPayload, render, sequence_with};
use crate::domain::config::StackConfig;
use crate::domain::error::{GraphError, ProjectionError};
use crate::domain::graph::{
    Deferred, Input, OutputRef, ResourceGraph, ResourceNode, ResourceSpec, SecretKind,
    ServerSpec, SshKeySpec, id_of,
};
use crate::domain::network::NetworkPolicy;
use crate::domain::projection::{MaterializedSecrets, project};
use crate::domain::state::{OutputValue, StackState};

pub const GATEWAY_TOKEN: &str = "openclaw-gateway-token";
pub const GATEWAY_TOKEN_LENGTH: usize = 48;
pub const SSH_PRIVATE_KEY: &str = "ssh-private-key";
pub const SSH_KEY: &str = "ssh-key";
pub const FIREWALL: &str = "firewall";
pub const SERVER: &str = "server";

/// Provider-side firewall name.
pub const FIREWALL_NAME: &str = "openclaw-firewall";

/// Output keys.
pub mod keys {
    pub const RESULT: &str = "result";
    pub const PUBLIC_KEY: &str = "publicKeyOpenssh";
    pub const PRIVATE_KEY: &str = "privateKeyOpenssh";
    pub const ID: &str = "id";
    pub const IPV4: &str = "ipv4Address";
    pub const IPV6: &str = "ipv6Address";
    pub const STATUS: &str = "status";
}

/// Labels attached to every provider resource.
#[must_use]
pub fn default_labels(stack: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("project".to_string(), "openclaw".to_string()),
        ("managed_by".to_string(), "agenthost".to_string()),
        ("stack".to_string(), stack.to_string()),
    ])
}

/// Declare every resource of the stack.
///
/// # Errors
///
/// Returns `GraphError::DuplicateNode` if two profiles map to the same
/// deploy key name.
pub fn build_graph(config: &StackConfig) -> Result<ResourceGraph, GraphError> {
    let labels = default_labels(&config.stack);
    let mut graph = ResourceGraph::new();

    graph.add(ResourceNode::new(
        GATEWAY_TOKEN,
        ResourceSpec::Secret(SecretKind::RandomToken {
            length: GATEWAY_TOKEN_LENGTH,
        }),
    ))?;
    for profile in config.profiles() {
        graph.add(ResourceNode::new(
            profile.deploy_key_name(),
            ResourceSpec::Secret(SecretKind::Ed25519Keypair),
        ))?;
    }
    graph.add(ResourceNode::new(
        SSH_PRIVATE_KEY,
        ResourceSpec::Secret(SecretKind::Ed25519Keypair),
    ))?;

    graph.add(ResourceNode::new(
        FIREWALL,
        ResourceSpec::Firewall(NetworkPolicy::egress_only(FIREWALL_NAME, labels.clone())),
    ))?;

    graph.add(ResourceNode::new(
        SSH_KEY,
        ResourceSpec::SshKey(SshKeySpec {
            name: format!("{}-key", config.server.name),
            public_key: Input::Deferred(
                Deferred::output(SSH_PRIVATE_KEY, keys::PUBLIC_KEY)
                    .apply(|v| Ok(v.expose().to_string())),
            ),
            labels: labels.clone(),
        }),
    ))?;

    graph.add(ResourceNode::new(
        SERVER,
        ResourceSpec::Server(ServerSpec {
            name: config.server.name.clone(),
            server_type: config.server.server_type.clone(),
            location: config.server.location.clone(),
            image: config.server.image.clone(),
            firewall_id: Input::Deferred(id_of(FIREWALL)),
            ssh_key_id: Input::Deferred(id_of(SSH_KEY)),
            user_data: Input::Deferred(user_data(config)),
            labels,
        }),
    ))?;

    Ok(graph)
}

/// The startup payload, deferred over the gateway token and every deploy key.
fn user_data(config: &StackConfig) -> Deferred<StartupPayload> {
    let key_names: Vec<String> = config.profiles().map(|p| p.deploy_key_name()).collect();
    let mut sources = vec![OutputRef::new(GATEWAY_TOKEN, keys::RESULT)];
    sources.extend(
        key_names
            .iter()
            .map(|name| OutputRef::new(name, keys::PRIVATE_KEY)),
    );

    let config = config.clone();
    Deferred::all(sources).apply(move |values| {
        let (token, keys) = values
            .split_first()
            .ok_or_else(|| GraphError::Derivation("gateway token missing".to_string()))?;
        let secrets = MaterializedSecrets {
            gateway_token: token.to_secret(),
            deploy_keys: key_names
                .iter()
                .cloned()
                .zip(keys.iter().map(OutputValue::to_secret))
                .collect(),
        };
        startup_payload(&config, &secrets)
    })
}

/// Project, sequence and render in one step.
///
/// # Errors
///
/// Returns `GraphError::Derivation` wrapping the projection or bootstrap
/// error.
pub fn startup_payload(
    config: &StackConfig,
    secrets: &MaterializedSecrets,
) -> Result<StartupPayload, GraphError> {
    let plan = bootstrap_plan(config, secrets)?;
    render(&plan).map_err(|e| GraphError::Derivation(e.to_string()))
}

/// The bootstrap plan the host runs on first boot.
///
/// # Errors
///
/// Returns `GraphError::Derivation` wrapping the projection or sequencing
/// error.
pub fn bootstrap_plan(
    config: &StackConfig,
    secrets: &MaterializedSecrets,
) -> Result<BootstrapPlan, GraphError> {
    let env = project(config, secrets).map_err(|e| GraphError::Derivation(e.to_string()))?;
    sequence_with(&env, &config.server.name, config.readiness)
        .map_err(|e| GraphError::Derivation(e.to_string()))
}

impl MaterializedSecrets {
    /// Read the generated secrets back from state.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::MissingSecret` naming the first secret not
    /// yet materialized.
    pub fn from_state(state: &StackState, config: &StackConfig) -> Result<Self, ProjectionError> {
        let secret = |node: &str, key: &str| -> Result<SecretString, ProjectionError> {
            state
                .output(node, key)
                .map(OutputValue::to_secret)
                .ok_or_else(|| ProjectionError::MissingSecret(node.to_string()))
        };
        let gateway_token = secret(GATEWAY_TOKEN, keys::RESULT)?;
        let deploy_keys = config
            .profiles()
            .map(|p| {
                let name = p.deploy_key_name();
                secret(&name, keys::PRIVATE_KEY).map(|k| (name, k))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            gateway_token,
            deploy_keys,
        })
    }
}
