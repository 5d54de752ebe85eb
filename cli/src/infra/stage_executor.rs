//! Infrastructure implementation of the `StageExecutor` port.
//!
//! Each stage script is fed to `bash -s` on stdin, so secret values never
//! appear in a process argument list.

use std::path::PathBuf;
use std::time::Duration;

use agenthost_common::SecretString;
use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::application::ports::{CommandRunner, StageExecutor};
use crate::domain::bootstrap::StageOutcome;
use crate::infra::command_runner::TokioCommandRunner;

/// Longest a single stage may run (package installs included).
pub const STAGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct BashStageExecutor<R: CommandRunner = TokioCommandRunner> {
    runner: R,
    log: PathBuf,
}

impl BashStageExecutor {
    #[must_use]
    pub fn new(log: PathBuf) -> Self {
        Self::with_runner(TokioCommandRunner::new(STAGE_TIMEOUT), log)
    }
}

impl<R: CommandRunner> BashStageExecutor<R> {
    #[must_use]
    pub fn with_runner(runner: R, log: PathBuf) -> Self {
        Self { runner, log }
    }

    async fn append_log(&self, stage: &str, outcome: &StageOutcome) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log)
            .await
            .with_context(|| format!("opening {}", self.log.display()))?;
        let entry = format!(
            "=== [{stage}] {} exit={} ===\n{}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            outcome.exit_code,
            outcome.output
        );
        file.write_all(entry.as_bytes())
            .await
            .with_context(|| format!("writing {}", self.log.display()))?;
        Ok(())
    }
}

impl<R: CommandRunner> StageExecutor for BashStageExecutor<R> {
    async fn execute(&self, stage: &str, script: &SecretString) -> Result<StageOutcome> {
        let output = self
            .runner
            .run_with_stdin("bash", &["-s"], script.expose_secret().as_bytes())
            .await?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let outcome = StageOutcome {
            // Killed by a signal: report like the shell does.
            exit_code: output.status.code().unwrap_or(128),
            output: text,
        };
        self.append_log(stage, &outcome).await.with_context(|| {
            format!(
                "stage {stage} exited {} but its transcript was not logged",
                outcome.exit_code
            )
        })?;
        Ok(outcome)
    }
}
