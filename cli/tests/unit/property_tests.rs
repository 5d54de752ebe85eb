//! Property-based tests for projection, policy, sequencing and secret
//! binding invariants.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet, HashSet};

use proptest::prelude::*;

use agenthost_cli::application::services::secrets::{Materialized, materialize};
use agenthost_cli::domain::bootstrap::StageKind;
use agenthost_cli::domain::config::{ConfigSource, StackConfig, keys};
use agenthost_cli::domain::graph::SecretKind;
use agenthost_cli::domain::network::{
    Direction, FirewallRule, NetworkPolicy, Protocol,
};
use agenthost_cli::domain::projection::{MaterializedSecrets, project};
use agenthost_cli::domain::stack::bootstrap_plan;
use agenthost_common::{AgentId, ProfileField, SecretString};

use crate::helpers::minimal_source;
use crate::mocks::SeqGenerator;

/// Ids end in a digit so they never collide with a fixed key segment.
fn agent_ids() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{1,5}[0-9]", 0..4)
}

fn build(ids: &BTreeSet<String>, with_bot: bool, with_repo: bool) -> (StackConfig, MaterializedSecrets) {
    let mut source: ConfigSource = minimal_source();
    if !ids.is_empty() {
        let joined: Vec<&str> = ids.iter().map(String::as_str).collect();
        source = source.with_plain(keys::AGENT_IDS, &joined.join(","));
    }
    if with_bot {
        source = source
            .with_secret(keys::TELEGRAM_BOT_TOKEN, "123:bot")
            .with_plain("telegramUserId", "1001");
    }
    if with_repo {
        source = source.with_plain("workspaceRepoUrl", "git@github.com:acme/notes.git");
    }
    let config = StackConfig::from_source(&source).unwrap();
    let deploy_keys: BTreeMap<String, SecretString> = config
        .profiles()
        .map(|p| {
            let name = p.deploy_key_name();
            let key = SecretString::new(format!("PRIV {name}\n"));
            (name, key)
        })
        .collect();
    let secrets = MaterializedSecrets {
        gateway_token: SecretString::new("gw-token"),
        deploy_keys,
    };
    (config, secrets)
}

proptest! {
    /// Equal inputs always project to equal environments.
    #[test]
    fn prop_projection_is_deterministic(ids in agent_ids(), bot in any::<bool>(), repo in any::<bool>()) {
        let (config, secrets) = build(&ids, bot, repo);
        let first = project(&config, &secrets).unwrap();
        let second = project(&config, &secrets).unwrap();
        prop_assert_eq!(first.to_dotenv(true), second.to_dotenv(true));
    }

    /// Named profiles carry their id as exactly one key segment; main keys
    /// carry none; no two profiles share a key.
    #[test]
    fn prop_profile_keys_are_disjoint(ids in agent_ids()) {
        let (config, secrets) = build(&ids, false, false);
        let env = project(&config, &secrets).unwrap();
        let uppers: Vec<String> = ids.iter().map(|i| i.to_ascii_uppercase()).collect();

        let mut seen = HashSet::new();
        for field in ProfileField::ALL {
            let main_key = field.env_key(None);
            prop_assert!(env.get(&main_key).is_some(), "missing {}", main_key);
            prop_assert!(main_key.split('_').all(|s| !uppers.iter().any(|u| u == s)));
            prop_assert!(seen.insert(main_key));

            for id in &ids {
                let agent = AgentId::parse(id).unwrap();
                let key = field.env_key(Some(&agent));
                let upper = agent.upper();
                prop_assert_eq!(key.split('_').filter(|s| *s == upper).count(), 1);
                prop_assert!(env.get(&key).is_some(), "missing {}", key);
                prop_assert!(seen.insert(key));
            }
        }
    }

    /// Unset optional settings project to the empty string, never vanish.
    #[test]
    fn prop_unset_optionals_project_empty(ids in agent_ids()) {
        let (config, secrets) = build(&ids, false, false);
        let env = project(&config, &secrets).unwrap();
        for field in ProfileField::ALL {
            if field == ProfileField::WorkspaceDeployKey {
                continue;
            }
            let value = env.get(&field.env_key(None)).unwrap();
            prop_assert!(value.is_empty());
        }
    }

    /// A policy with any inbound rule is rejected, whatever the order.
    #[test]
    fn prop_no_policy_admits_inbound_rules(inbound in prop::collection::vec(any::<bool>(), 0..8)) {
        let rules: Vec<FirewallRule> = inbound
            .iter()
            .enumerate()
            .map(|(i, is_in)| {
                let mut rule = FirewallRule::egress(Protocol::Tcp, Some("443"), &format!("rule {i}"));
                if *is_in {
                    rule.direction = Direction::In;
                    rule.source_ips = rule.destination_ips.drain(..).collect();
                }
                rule
            })
            .collect();
        let result = NetworkPolicy::new("openclaw-firewall", rules, BTreeMap::new());
        prop_assert_eq!(result.is_err(), inbound.contains(&true));
        if let Ok(policy) = result {
            prop_assert!(policy.rules().iter().all(|r| r.direction == Direction::Out));
        }
    }

    /// Overlay join < onboarding < setup token < gateway service < readiness < external
    /// access, whatever optional stages are present.
    #[test]
    fn prop_core_stage_order_is_fixed(ids in agent_ids(), bot in any::<bool>(), repo in any::<bool>()) {
        let (config, secrets) = build(&ids, bot, repo);
        let plan = bootstrap_plan(&config, &secrets).unwrap();
        let order = [
            StageKind::JoinOverlay,
            StageKind::OnboardAgent,
            StageKind::SetupToken,
            StageKind::GatewayService,
            StageKind::Readiness,
            StageKind::ExternalAccess,
        ];
        let positions: Vec<usize> = order.iter().map(|k| plan.position(*k).unwrap()).collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    /// A bound keypair is reused on every later materialization.
    #[test]
    fn prop_deploy_keys_are_stable(runs in 1usize..6) {
        let generator = SeqGenerator::new();
        let (first, how) =
            materialize(&generator, "workspace-deploy-key", SecretKind::Ed25519Keypair, None, false).unwrap();
        prop_assert_eq!(how, Materialized::Generated);
        let mut current = first.clone();
        for _ in 0..runs {
            let (next, how) = materialize(
                &generator,
                "workspace-deploy-key",
                SecretKind::Ed25519Keypair,
                Some(&current),
                false,
            )
            .unwrap();
            prop_assert_eq!(how, Materialized::Reused);
            current = next;
        }
        prop_assert_eq!(current, first);
        prop_assert_eq!(generator.generated(), 1);
    }
}
