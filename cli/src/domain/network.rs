//! Host network perimeter.
//!
//! A `NetworkPolicy` can only be built without inbound rules; the host is
//! reached through the overlay network, never a public port.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::error::PolicyError;

pub const ANY_IPV4: &str = "0.0.0.0/0";
pub const ANY_IPV6: &str = "::/0";
pub const ALL_PORTS: &str = "1-65535";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

/// One firewall rule, in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRule {
    pub direction: Direction,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_ips: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destination_ips: Vec<String>,
    pub description: String,
}

impl FirewallRule {
    /// Outbound rule to every IPv4 and IPv6 destination.
    #[must_use]
    pub fn egress(protocol: Protocol, port: Option<&str>, description: &str) -> Self {
        Self {
            direction: Direction::Out,
            protocol,
            port: port.map(str::to_string),
            source_ips: Vec::new(),
            destination_ips: vec![ANY_IPV4.to_string(), ANY_IPV6.to_string()],
            description: description.to_string(),
        }
    }
}

/// Firewall definition with zero inbound rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkPolicy {
    name: String,
    rules: Vec<FirewallRule>,
    labels: BTreeMap<String, String>,
}

impl NetworkPolicy {
    /// Build a policy from explicit rules.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::InboundRule` if any rule is inbound.
    pub fn new(
        name: impl Into<String>,
        rules: Vec<FirewallRule>,
        labels: BTreeMap<String, String>,
    ) -> Result<Self, PolicyError> {
        let name = name.into();
        if let Some(rule) = rules.iter().find(|r| r.direction == Direction::In) {
            return Err(PolicyError::InboundRule {
                policy: name,
                description: rule.description.clone(),
            });
        }
        Ok(Self {
            name,
            rules,
            labels,
        })
    }

    /// Outbound TCP, UDP and ICMP to anywhere; nothing inbound.
    #[must_use]
    pub fn egress_only(name: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            rules: vec![
                FirewallRule::egress(Protocol::Tcp, Some(ALL_PORTS), "Allow all outbound TCP"),
                FirewallRule::egress(Protocol::Udp, Some(ALL_PORTS), "Allow all outbound UDP"),
                FirewallRule::egress(Protocol::Icmp, None, "Allow outbound ICMP"),
            ],
            labels,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}
