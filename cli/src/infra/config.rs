//! Loading the stack configuration from a YAML file on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::config::{ConfigFile, StackConfig};

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "agenthost.yaml";

/// Reads `agenthost.yaml` and resolves `secretEnv` references from the
/// process environment.
pub struct YamlConfigLoader {
    path: PathBuf,
}

impl YamlConfigLoader {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// configuration is invalid.
    pub fn load(&self) -> Result<StackConfig> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let file = ConfigFile::parse(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))?;
        let source = file.resolve(|var| std::env::var(var).ok());
        let config = StackConfig::from_source(&source)?;
        for key in &config.unknown_keys {
            tracing::warn!(%key, "ignoring unknown config key");
        }
        Ok(config)
    }
}
