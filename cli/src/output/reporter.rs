//! `TerminalReporter`: presentation-layer implementation of `ProgressReporter`.
//!
//! Application services emit progress through the port; this type turns the
//! events into terminal lines on stderr so stdout stays parseable.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"`
/// - `success()` prints `"  ✓ {message}"`
/// - `warn()` prints `"  ⚠ {message}"`
///
/// All three are suppressed when `ctx.quiet`. While a spinner is attached,
/// lines are printed above it.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    spinner: Option<ProgressBar>,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx, spinner: None }
    }

    /// Route lines through `spinner` until it is finished.
    #[must_use]
    pub fn with_spinner(mut self, spinner: ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    fn line(&self, line: String) {
        if self.ctx.quiet {
            return;
        }
        match &self.spinner {
            Some(pb) if !pb.is_finished() && !pb.is_hidden() => pb.println(line),
            _ => eprintln!("{line}"),
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.line(format!("  {} {message}", "→".style(self.ctx.styles.info)));
    }

    fn success(&self, message: &str) {
        self.line(format!("  {} {message}", "✓".style(self.ctx.styles.success)));
    }

    fn warn(&self, message: &str) {
        self.line(format!("  {} {message}", "⚠".style(self.ctx.styles.warning)));
    }
}
