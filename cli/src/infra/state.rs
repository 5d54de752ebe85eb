//! Infrastructure implementation of the `StackStateStore` port.
//!
//! `StateManager` provides async load/save using `tokio::task::spawn_blocking`
//! with atomic write (temp file + rename) to prevent state corruption. The
//! file holds secret outputs, so it is written owner-only.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::StackStateStore;
use crate::domain::state::{STATE_VERSION, StackState};

/// State file manager implementing `StackStateStore` for the infra layer.
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    /// Create a state manager for `stack` at the default path
    /// (`~/.agenthost/stacks/<stack>.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn for_stack(stack: &str) -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(
            home.join(".agenthost")
                .join("stacks")
                .join(format!("{stack}.json")),
        ))
    }

    /// Create a state manager with an explicit path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous load, used internally by `load_async` via `spawn_blocking`.
    fn load_sync(&self) -> Result<Option<StackState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {}", self.path.display()))?;
        let state: StackState = serde_json::from_str(&content)
            .with_context(|| format!("parsing state file {}", self.path.display()))?;
        anyhow::ensure!(
            state.version == STATE_VERSION,
            "state file {} has version {}, this build reads version {STATE_VERSION}",
            self.path.display(),
            state.version
        );
        Ok(Some(state))
    }

    /// Synchronous save, used internally by `save_async` via `spawn_blocking`.
    ///
    /// The file holds every generated secret, so it is never readable by
    /// anyone but the owner, not even while the temp file is written.
    fn save_sync(&self, state: &StackState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(state).context("serializing state")?;

        let temp_path = self.path.with_extension("json.tmp");
        write_private(&temp_path, content.as_bytes())
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("finalizing state file {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "saved stack state");
        Ok(())
    }
}

/// `mkdir -p` with mode `0700` for every directory it creates.
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Write `content` to a fresh file created with mode `0600`.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    // A leftover from an interrupted save may carry wider permissions.
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

impl StackStateStore for StateManager {
    async fn load_async(&self) -> Result<Option<StackState>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mgr = StateManager::with_path(path);
            mgr.load_sync()
        })
        .await
        .context("state load task panicked")?
    }

    async fn save_async(&self, state: &StackState) -> Result<()> {
        let path = self.path.clone();
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let mgr = StateManager::with_path(path);
            mgr.save_sync(&state)
        })
        .await
        .context("state save task panicked")?
    }
}
