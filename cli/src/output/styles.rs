//! Output styles using the owo-colors stylesheet pattern.

use owo_colors::Style;

use crate::domain::plan::PlannedAction;

/// Centralized stylesheet for CLI output colors.
///
/// `Default` is the uncolored sheet; `colorize` switches it on.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    pub dim: Style,
    pub bold: Style,
    /// Section titles
    pub header: Style,
    /// Resources that will be created
    pub create: Style,
    /// Resources changed in place or regenerated
    pub update: Style,
    /// Resources that will be destroyed and recreated
    pub replace: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.create = Style::new().green().bold();
        self.update = Style::new().yellow();
        self.replace = Style::new().red().bold();
    }

    /// Style for a planned action in the preview table.
    #[must_use]
    pub fn action(&self, action: PlannedAction) -> Style {
        match action {
            PlannedAction::Create => self.create,
            PlannedAction::Update | PlannedAction::Regenerate => self.update,
            PlannedAction::Replace => self.replace,
            PlannedAction::Same | PlannedAction::Pending => self.dim,
        }
    }
}
