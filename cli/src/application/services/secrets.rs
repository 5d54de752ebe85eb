//! Application service: secret materialization.
//!
//! A generated secret is bound to its logical name through stack state, so
//! the same name yields the same value on every run.

use anyhow::{Context, Result};

use crate::application::ports::SecretGenerator;
use crate::domain::graph::SecretKind;
use crate::domain::stack::keys;
use crate::domain::state::{NodeOutputs, OutputValue, ResourceRecord};

/// What happened to a secret binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Generated,
    Reused,
    Regenerated,
}

/// Resolve the secret bound to `name`.
///
/// The existing binding is reused unless `force` is set or its kind or
/// parameters changed.
///
/// # Errors
///
/// Returns an error if generation fails; the build cannot continue without
/// the secret.
pub fn materialize(
    generator: &impl SecretGenerator,
    name: &str,
    kind: SecretKind,
    existing: Option<&ResourceRecord>,
    force: bool,
) -> Result<(ResourceRecord, Materialized)> {
    let fingerprint = kind.fingerprint();
    if let Some(record) = existing
        && !force
        && record.fingerprint == fingerprint
    {
        tracing::debug!(secret = name, "reusing materialized secret");
        return Ok((record.clone(), Materialized::Reused));
    }

    let outputs = generate(generator, kind).with_context(|| format!("generating secret {name}"))?;
    let how = if existing.is_some() {
        Materialized::Regenerated
    } else {
        Materialized::Generated
    };
    tracing::info!(secret = name, kind = %fingerprint, ?how, "materialized secret");
    Ok((
        ResourceRecord {
            kind: kind.resource_kind(),
            id: None,
            fingerprint,
            outputs,
        },
        how,
    ))
}

fn generate(generator: &impl SecretGenerator, kind: SecretKind) -> Result<NodeOutputs> {
    let mut outputs = NodeOutputs::new();
    match kind {
        SecretKind::RandomToken { length } => {
            let token = generator.random_token(length)?;
            anyhow::ensure!(
                token.len() == length,
                "generated token has {} characters, expected {length}",
                token.len()
            );
            outputs.insert(keys::RESULT.to_string(), OutputValue::Secret(token));
        }
        SecretKind::Ed25519Keypair => {
            let pair = generator.ed25519_keypair()?;
            outputs.insert(
                keys::PUBLIC_KEY.to_string(),
                OutputValue::Plain(pair.public_key_openssh),
            );
            outputs.insert(
                keys::PRIVATE_KEY.to_string(),
                OutputValue::Secret(pair.private_key_openssh),
            );
        }
    }
    Ok(outputs)
}
