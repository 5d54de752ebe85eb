//! Typed resource graph with deferred-reference edges.
//!
//! A node's inputs are either literals or `Deferred` values that read
//! outputs of other nodes. Edges are derived from those references, so
//! ordering never depends on declaration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use agenthost_common::SecretString;
use sha2::{Digest, Sha256};

use crate::domain::bootstrap::StartupPayload;
use crate::domain::error::GraphError;
use crate::domain::network::NetworkPolicy;
use crate::domain::state::{NodeOutputs, OutputValue, ResourceKind};

// ── Deferred values ──────────────────────────────────────────────────────────

/// Address of one output of one node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: String,
    pub key: String,
}

impl OutputRef {
    #[must_use]
    pub fn new(node: &str, key: &str) -> Self {
        Self {
            node: node.to_string(),
            key: key.to_string(),
        }
    }
}

type Resolver<T> = Arc<dyn Fn(&[OutputValue]) -> Result<T, GraphError> + Send + Sync>;

/// A value known only after its source nodes have been realized.
pub struct Deferred<T> {
    sources: Vec<OutputRef>,
    resolver: Resolver<T>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl Deferred<OutputValue> {
    /// One output of one node.
    #[must_use]
    pub fn output(node: &str, key: &str) -> Self {
        let source = OutputRef::new(node, key);
        let missing = source.clone();
        Self {
            sources: vec![source],
            resolver: Arc::new(move |values| {
                values.first().cloned().ok_or_else(|| GraphError::MissingOutput {
                    node: missing.node.clone(),
                    key: missing.key.clone(),
                })
            }),
        }
    }
}

impl Deferred<Vec<OutputValue>> {
    /// Several outputs, resolved together in the given order.
    #[must_use]
    pub fn all(sources: Vec<OutputRef>) -> Self {
        Self {
            sources,
            resolver: Arc::new(|values| Ok(values.to_vec())),
        }
    }
}

impl<T: 'static> Deferred<T> {
    /// Derive a new deferred value; `f` runs only once the sources resolve.
    #[must_use]
    pub fn apply<U: 'static, F>(self, f: F) -> Deferred<U>
    where
        F: Fn(T) -> Result<U, GraphError> + Send + Sync + 'static,
    {
        let inner = self.resolver;
        Deferred {
            sources: self.sources,
            resolver: Arc::new(move |values| f(inner(values)?)),
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[OutputRef] {
        &self.sources
    }

    /// Resolve against realized outputs.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::MissingOutput` if a source has not been realized,
    /// or whatever the derivation chain returns.
    pub fn resolve(&self, outputs: &BTreeMap<String, NodeOutputs>) -> Result<T, GraphError> {
        let values = self
            .sources
            .iter()
            .map(|r| {
                outputs
                    .get(&r.node)
                    .and_then(|o| o.get(&r.key))
                    .cloned()
                    .ok_or_else(|| GraphError::MissingOutput {
                        node: r.node.clone(),
                        key: r.key.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        (self.resolver)(&values)
    }
}

/// Provider ids arrive as text; numeric inputs parse them on the edge.
#[must_use]
pub fn id_of(node: &str) -> Deferred<u64> {
    let name = node.to_string();
    Deferred::output(node, "id").apply(move |value| {
        value
            .expose()
            .trim()
            .parse::<u64>()
            .map_err(|_| GraphError::Coercion {
                node: name.clone(),
                key: "id".to_string(),
                expected: "an integer id",
            })
    })
}

/// A node input: literal, or deferred on other nodes.
#[derive(Debug, Clone)]
pub enum Input<T> {
    Literal(T),
    Deferred(Deferred<T>),
}

impl<T: Clone + 'static> Input<T> {
    #[must_use]
    pub fn sources(&self) -> &[OutputRef] {
        match self {
            Self::Literal(_) => &[],
            Self::Deferred(d) => d.sources(),
        }
    }

    /// # Errors
    ///
    /// See [`Deferred::resolve`].
    pub fn resolve(&self, outputs: &BTreeMap<String, NodeOutputs>) -> Result<T, GraphError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Deferred(d) => d.resolve(outputs),
        }
    }
}

impl<T> From<Deferred<T>> for Input<T> {
    fn from(d: Deferred<T>) -> Self {
        Self::Deferred(d)
    }
}

// ── Resource specs ───────────────────────────────────────────────────────────

/// Generated secret kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    RandomToken { length: usize },
    Ed25519Keypair,
}

impl SecretKind {
    /// Identity of the kind and its parameters. A binding whose fingerprint
    /// differs is regenerated.
    #[must_use]
    pub fn fingerprint(self) -> String {
        match self {
            Self::RandomToken { length } => format!("random-token:{length}"),
            Self::Ed25519Keypair => "ed25519".to_string(),
        }
    }

    #[must_use]
    pub fn resource_kind(self) -> ResourceKind {
        match self {
            Self::RandomToken { .. } => ResourceKind::RandomToken,
            Self::Ed25519Keypair => ResourceKind::Ed25519Key,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SshKeySpec {
    pub name: String,
    pub public_key: Input<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub name: String,
    pub server_type: String,
    pub location: String,
    pub image: String,
    pub firewall_id: Input<u64>,
    pub ssh_key_id: Input<u64>,
    pub user_data: Input<StartupPayload>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum ResourceSpec {
    Secret(SecretKind),
    Firewall(NetworkPolicy),
    SshKey(SshKeySpec),
    Server(ServerSpec),
}

impl ResourceSpec {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Secret(k) => k.resource_kind(),
            Self::Firewall(_) => ResourceKind::Firewall,
            Self::SshKey(_) => ResourceKind::SshKey,
            Self::Server(_) => ResourceKind::Server,
        }
    }

    fn sources(&self) -> Vec<&OutputRef> {
        match self {
            Self::Secret(_) | Self::Firewall(_) => Vec::new(),
            Self::SshKey(s) => s.public_key.sources().iter().collect(),
            Self::Server(s) => s
                .firewall_id
                .sources()
                .iter()
                .chain(s.ssh_key_id.sources())
                .chain(s.user_data.sources())
                .collect(),
        }
    }

    /// Resolve every deferred input.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error.
    pub fn resolve(
        &self,
        outputs: &BTreeMap<String, NodeOutputs>,
    ) -> Result<ResolvedSpec, GraphError> {
        Ok(match self {
            Self::Secret(kind) => ResolvedSpec::Secret(*kind),
            Self::Firewall(policy) => ResolvedSpec::Firewall(policy.clone()),
            Self::SshKey(s) => ResolvedSpec::SshKey(ResolvedSshKey {
                name: s.name.clone(),
                public_key: s.public_key.resolve(outputs)?,
                labels: s.labels.clone(),
            }),
            Self::Server(s) => ResolvedSpec::Server(ResolvedServer {
                name: s.name.clone(),
                server_type: s.server_type.clone(),
                location: s.location.clone(),
                image: s.image.clone(),
                firewall_id: s.firewall_id.resolve(outputs)?,
                ssh_key_id: s.ssh_key_id.resolve(outputs)?,
                user_data: s.user_data.resolve(outputs)?,
                labels: s.labels.clone(),
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSshKey {
    pub name: String,
    pub public_key: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedServer {
    pub name: String,
    pub server_type: String,
    pub location: String,
    pub image: String,
    pub firewall_id: u64,
    pub ssh_key_id: u64,
    pub user_data: StartupPayload,
    pub labels: BTreeMap<String, String>,
}

impl ResolvedServer {
    #[must_use]
    pub fn user_data(&self) -> &SecretString {
        &self.user_data.script
    }
}

/// A node with all inputs known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSpec {
    Secret(SecretKind),
    Firewall(NetworkPolicy),
    SshKey(ResolvedSshKey),
    Server(ResolvedServer),
}

impl ResolvedSpec {
    /// Hash of the inputs that decide replacement.
    ///
    /// The host payload is hashed in full, secrets included: a rotated token
    /// or key changes what the host boots with, so the host is replaced.
    /// Only the digest is kept.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = match self {
            Self::Secret(kind) => return kind.fingerprint(),
            Self::Firewall(policy) => format!("firewall\n{policy:?}"),
            Self::SshKey(key) => format!("ssh-key\n{}\n{}", key.name, key.public_key),
            Self::Server(s) => format!(
                "server\n{}\n{}\n{}\n{}\n{}\n{}\n{}",
                s.name,
                s.server_type,
                s.location,
                s.image,
                s.firewall_id,
                s.ssh_key_id,
                s.user_data.script.expose_secret()
            ),
        };
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// ── Graph ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub name: String,
    pub spec: ResourceSpec,
}

impl ResourceNode {
    #[must_use]
    pub fn new(name: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// Names of the nodes this one reads outputs from.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.spec
            .sources()
            .into_iter()
            .map(|r| r.node.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: BTreeMap<String, ResourceNode>,
}

impl ResourceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `GraphError::DuplicateNode` if the name is taken.
    pub fn add(&mut self, node: ResourceNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceNode> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Group nodes into waves; every dependency of a node sits in an earlier
    /// wave. Waves and their members are sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownReference` for a reference to an
    /// undeclared node, or `GraphError::Cycle` listing the nodes on cycles.
    pub fn waves(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for node in self.nodes.values() {
            let deps = node.dependencies();
            if let Some(target) = deps.iter().find(|d| !self.nodes.contains_key(**d)) {
                return Err(GraphError::UnknownReference {
                    node: node.name.clone(),
                    target: (*target).to_string(),
                });
            }
            remaining.insert(node.name.as_str(), deps);
        }

        let mut waves = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();
            if ready.is_empty() {
                return Err(GraphError::Cycle(
                    remaining.keys().map(|k| (*k).to_string()).collect(),
                ));
            }
            for name in &ready {
                remaining.remove(name);
            }
            for deps in remaining.values_mut() {
                for name in &ready {
                    deps.remove(name);
                }
            }
            waves.push(ready.into_iter().map(str::to_string).collect());
        }
        Ok(waves)
    }
}
