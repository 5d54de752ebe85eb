//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use agenthost_common::FlatEnv;
use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::stack::UpOutcome;
use crate::domain::bootstrap::StartupPayload;
use crate::domain::outputs::StackOutputs;
use crate::domain::plan::NodePlan;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stderr is a TTY (progress and status lines go there).
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stderr().is_term();
        let use_colors = !no_color && is_tty && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗`. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {}", msg.style(self.styles.header));
        }
    }
}

/// Renderer for the current output mode.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(r) => r.render_version(version),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_preview(&self, stack: &str, plans: &[NodePlan]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_preview(stack, plans);
                Ok(())
            }
            Self::Json(r) => r.render_preview(stack, plans),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_up(&self, stack: &str, outcome: &UpOutcome, outputs: &StackOutputs) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_up(stack, outcome, outputs);
                Ok(())
            }
            Self::Json(r) => r.render_up(stack, outcome, outputs),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_outputs(&self, outputs: &StackOutputs, show_secrets: bool) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_outputs(outputs, show_secrets);
                Ok(())
            }
            Self::Json(r) => r.render_outputs(outputs, show_secrets),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_env(&self, env: &FlatEnv, show_secrets: bool) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_env(env, show_secrets);
                Ok(())
            }
            Self::Json(r) => r.render_env(env, show_secrets),
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_bootstrap(&self, payload: &StartupPayload, show_secrets: bool) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_bootstrap(payload, show_secrets);
                Ok(())
            }
            Self::Json(r) => r.render_bootstrap(payload, show_secrets),
        }
    }
}
