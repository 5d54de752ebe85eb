//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod graph;
pub mod inventory;
pub mod network;
pub mod outputs;
pub mod plan;
pub mod projection;
pub mod stack;
pub mod state;

#[allow(unused_imports)]
pub use config::{ConfigFile, ConfigSource, StackConfig};
#[allow(unused_imports)]
pub use error::{BootstrapError, ConfigError, GraphError, PolicyError, ProjectionError};
#[allow(unused_imports)]
pub use graph::{ResourceGraph, ResourceSpec, ResolvedSpec, SecretKind};
#[allow(unused_imports)]
pub use plan::{NodePlan, PlannedAction, plan_actions};
#[allow(unused_imports)]
pub use projection::{MaterializedSecrets, project};
#[allow(unused_imports)]
pub use state::{StackState, STATE_VERSION};
