//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags, PathFlags};
use crate::commands;
use crate::infra::config::DEFAULT_CONFIG_FILE;

/// Provision and bootstrap a single-host AI agent gateway
#[derive(Parser)]
#[command(
    name = "agenthost",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Stack configuration file
    #[arg(long, global = true, env = "AGENTHOST_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// State file (default: ~/.agenthost/stacks/<stack>.json)
    #[arg(long, global = true, env = "AGENTHOST_STATE")]
    pub state: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what `up` would change
    Preview(commands::preview::PreviewArgs),

    /// Create or update the stack and provision the host
    Up(commands::up::UpArgs),

    /// Show stack outputs
    Outputs(commands::ShowSecretsArgs),

    /// Print the provisioning environment as dotenv
    Env(commands::ShowSecretsArgs),

    /// Print the first-boot script
    RenderBootstrap(commands::ShowSecretsArgs),

    /// Ansible dynamic inventory
    Inventory(commands::inventory::InventoryArgs),

    /// Show version
    Version,

    /// Run the bootstrap stages on this machine
    #[command(hide = true, name = "_first-boot")]
    FirstBoot(commands::first_boot::FirstBootArgs),
}

impl Cli {
    /// Whether errors should be printed as JSON objects.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            config,
            state,
            json,
            quiet,
            no_color,
            command,
        } = self;
        let yes = match &command {
            Command::Up(args) => args.yes,
            Command::FirstBoot(args) => args.yes,
            _ => false,
        };
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
            paths: PathFlags { config, state },
        });

        match command {
            Command::Preview(args) => commands::preview::run(&app, &args).await,
            Command::Up(args) => commands::up::run(&app, args).await,
            Command::Outputs(args) => commands::outputs::run(&app, &args).await,
            Command::Env(args) => commands::env::run(&app, &args).await,
            Command::RenderBootstrap(args) => commands::render_bootstrap::run(&app, &args).await,
            Command::Inventory(args) => commands::inventory::run(&app, &args).await,
            Command::Version => commands::version::run(&app),
            Command::FirstBoot(args) => commands::first_boot::run(&app, &args).await,
        }
    }
}
