//! Command implementations

pub mod env;
pub mod first_boot;
pub mod inventory;
pub mod outputs;
pub mod preview;
pub mod render_bootstrap;
pub mod up;
pub mod version;

use clap::Args;

/// Arguments shared by commands that can print secret values.
#[derive(Args, Default)]
pub struct ShowSecretsArgs {
    /// Print secret values instead of `[secret]`
    #[arg(long)]
    pub show_secrets: bool,
}
