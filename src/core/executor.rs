/// Per-container backup pipeline
///
/// pre-command -> command -> extraction -> post-command -> retention,
/// strictly in that order. The first failing step aborts the backup of
/// that container; partial state is left for the next retention pass.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::docker::{ContainerRuntime, ExecOutput};
use crate::core::error::{BackupError, Result, Stage};
use crate::core::labels::BackupConfig;
use crate::core::retention;
use crate::utils::{artifact_name, shell_quote, SuccessCheckKind};

/// Decides whether an in-container command succeeded
pub trait SuccessCheck: Send + Sync {
    fn passed(&self, result: &ExecOutput) -> bool;
}

/// Fails when the output mentions "error" or "Error".
///
/// Commands that print the word on success are reported as failures,
/// and failing commands that stay quiet pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputScan;

impl SuccessCheck for OutputScan {
    fn passed(&self, result: &ExecOutput) -> bool {
        !(result.output.contains("error") || result.output.contains("Error"))
    }
}

/// Fails on any exit code other than 0, or when none was reported
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitCode;

impl SuccessCheck for ExitCode {
    fn passed(&self, result: &ExecOutput) -> bool {
        result.exit_code == Some(0)
    }
}

/// Both [`OutputScan`] and [`ExitCode`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Strict;

impl SuccessCheck for Strict {
    fn passed(&self, result: &ExecOutput) -> bool {
        OutputScan.passed(result) && ExitCode.passed(result)
    }
}

impl SuccessCheckKind {
    pub fn build(self) -> Arc<dyn SuccessCheck> {
        match self {
            SuccessCheckKind::Output => Arc::new(OutputScan),
            SuccessCheckKind::ExitCode => Arc::new(ExitCode),
            SuccessCheckKind::Strict => Arc::new(Strict),
        }
    }
}

/// Artifact stored on the host by a successful backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
}

pub struct Executor {
    runtime: Arc<dyn ContainerRuntime>,
    backup_dir: PathBuf,
    check: Arc<dyn SuccessCheck>,
}

impl Executor {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        backup_dir: impl Into<PathBuf>,
        check: Arc<dyn SuccessCheck>,
    ) -> Self {
        Self {
            runtime,
            backup_dir: backup_dir.into(),
            check,
        }
    }

    /// Run the full pipeline for one container
    pub async fn execute(&self, config: &BackupConfig) -> Result<Artifact> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| BackupError::MissingCommand(config.container_name.clone()))?;

        let name = artifact_name(&config.container_name, Utc::now());
        let host_dir = self.backup_dir.join(&config.container_name);
        tokio::fs::create_dir_all(&host_dir).await?;

        if let Some(pre_command) = &config.pre_command {
            self.run_stage(config, Stage::PreCommand, pre_command).await?;
        }

        let location = normalize_location(&config.location);
        let container_path = join_container_path(location, &name);
        let main_command = format!(
            "mkdir -p {} && ( {} ) > {}",
            shell_quote(location),
            command,
            shell_quote(&container_path)
        );
        self.run_stage(config, Stage::Command, &main_command).await?;

        let host_path = self
            .extract(config, &name, &container_path, &host_dir)
            .await?;

        if let Some(post_command) = &config.post_command {
            self.run_stage(config, Stage::PostCommand, post_command).await?;
        }

        info!(
            container = %config.container_name,
            artifact = %host_path.display(),
            "backup completed"
        );

        self.apply_retention(config, &host_dir).await;

        Ok(Artifact {
            name,
            path: host_path,
        })
    }

    async fn run_stage(
        &self,
        config: &BackupConfig,
        stage: Stage,
        command: &str,
    ) -> Result<ExecOutput> {
        debug!(container = %config.container_name, %stage, command, "running command");

        let result = self.runtime.exec(&config.container_id, command).await?;

        if !self.check.passed(&result) {
            error!(
                container = %config.container_name,
                %stage,
                exit_code = ?result.exit_code,
                output = %result.output.trim(),
                "command failed"
            );
            return Err(BackupError::CommandFailed {
                stage,
                container: config.container_name.clone(),
                output: result.output,
            });
        }

        Ok(result)
    }

    async fn extract(
        &self,
        config: &BackupConfig,
        name: &str,
        container_path: &str,
        host_dir: &Path,
    ) -> Result<PathBuf> {
        let extraction_error = |reason: String| BackupError::Extraction {
            container: config.container_name.clone(),
            artifact: name.to_string(),
            reason,
        };

        debug!(
            container = %config.container_name,
            stage = %Stage::Extract,
            path = container_path,
            "copying artifact"
        );

        self.runtime
            .copy_from_container(&config.container_id, container_path, host_dir)
            .await
            .map_err(|e| extraction_error(e.to_string()))?;

        let host_path = host_dir.join(name);
        if !tokio::fs::try_exists(&host_path).await.unwrap_or(false) {
            return Err(extraction_error(format!(
                "{} not found after copy",
                host_path.display()
            )));
        }

        Ok(host_path)
    }

    async fn apply_retention(&self, config: &BackupConfig, host_dir: &Path) {
        let dir = host_dir.to_path_buf();
        let keep = config.retention;
        let pruned = tokio::task::spawn_blocking(move || retention::prune(&dir, keep)).await;

        match pruned {
            Ok(Ok(report)) if !report.failed.is_empty() => warn!(
                container = %config.container_name,
                failed = report.failed.len(),
                "some old backups could not be removed"
            ),
            Ok(Ok(report)) => debug!(
                container = %config.container_name,
                kept = report.kept,
                removed = report.removed.len(),
                "retention applied"
            ),
            Ok(Err(e)) => {
                warn!(container = %config.container_name, error = %e, "retention failed")
            }
            Err(e) => {
                warn!(container = %config.container_name, error = %e, "retention task failed")
            }
        }
    }
}

/// Location without trailing slashes; `/` stays `/`
fn normalize_location(location: &str) -> &str {
    match location.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn join_container_path(location: &str, name: &str) -> String {
    if location == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", location, name)
    }
}
