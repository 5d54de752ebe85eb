pub mod agent;
pub mod env;
pub mod env_keys;
pub mod secret;

pub use agent::{
    AgentId, AgentIdError, MAIN_DEPLOY_KEY, MAIN_PROFILE, MAIN_VAULT_OWNER, parse_agent_ids,
};
pub use env::{EnvError, EnvValue, FlatEnv};
pub use env_keys::{ProfileField, global};
pub use secret::{REDACTED, SecretString};
