//! Application context: unified state passed to every command handler.
//!
//! Built once in `Cli::run()` from the global flags. Commands reach the
//! config file, the state store and the renderer through it.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::config::StackConfig;
use crate::infra::config::YamlConfigLoader;
use crate::infra::state::StateManager;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Set to skip confirmation prompts, like `--yes`.
pub const YES_ENV: &str = "AGENTHOST_YES";

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `AGENTHOST_YES`).
    pub yes: bool,
}

/// Where configuration and state live.
pub struct PathFlags {
    pub config: PathBuf,
    /// Overrides `~/.agenthost/stacks/<stack>.json`.
    pub state: Option<PathBuf>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    pub behaviour: BehaviourFlags,
    pub paths: PathFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    pub mode: OutputMode,
    pub config_path: PathBuf,
    pub state_path: Option<PathBuf>,
    /// When `true`, skip interactive prompts and use defaults.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let env_yes = std::env::var_os("CI").is_some() || std::env::var_os(YES_ENV).is_some();
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config_path: flags.paths.config,
            state_path: flags.paths.state,
            non_interactive: flags.behaviour.yes || env_yes,
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Progress reporter for application services.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Load and validate the stack configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or lacks a
    /// required value.
    pub fn load_config(&self) -> Result<StackConfig> {
        YamlConfigLoader::new(self.config_path.clone()).load()
    }

    /// Directory relative commands (the provision command) run in: the
    /// config file's directory.
    #[must_use]
    pub fn project_dir(&self) -> Option<PathBuf> {
        self.config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// State store for `stack`, honouring `--state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn state_store(&self, stack: &str) -> Result<StateManager> {
        match &self.state_path {
            Some(path) => Ok(StateManager::with_path(path.clone())),
            None => StateManager::for_stack(stack),
        }
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes`, or `AGENTHOST_YES`),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
