/// Process-wide configuration
///
/// Built once at startup from CLI flags and environment variables
/// (`LABEL_PREFIX`, `BACKUP_DIR`, `CRON_SCHEDULE`, ...) and passed by
/// reference into every component. Immutable afterwards.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::core::schedule::CronSchedule;
use crate::utils::{DEFAULT_BACKUP_DIR, DEFAULT_CRON_SCHEDULE, DEFAULT_LABEL_PREFIX};

/// How the result of an in-container command is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SuccessCheckKind {
    /// Fail when the output contains "error" or "Error"
    #[default]
    Output,
    /// Fail on a non-zero exit code
    ExitCode,
    /// Both checks must pass
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub label_prefix: String,
    pub backup_dir: PathBuf,
    pub cron_schedule: String,
    /// `None` disables the per-container timeout
    pub timeout: Option<Duration>,
    pub success_check: SuccessCheckKind,
    pub run_on_startup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            cron_schedule: DEFAULT_CRON_SCHEDULE.to_string(),
            timeout: Some(Duration::from_secs(60 * 60)),
            success_check: SuccessCheckKind::Output,
            run_on_startup: true,
        }
    }
}

impl AppConfig {
    /// Build and validate configuration from parsed CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let timeout = humantime::parse_duration(cli.timeout.trim())
            .with_context(|| format!("Invalid BACKUP_TIMEOUT '{}'", cli.timeout))?;

        let config = Self {
            label_prefix: cli.label_prefix.trim().to_string(),
            backup_dir: cli.backup_dir.clone(),
            cron_schedule: cli.cron_schedule.trim().to_string(),
            timeout: (!timeout.is_zero()).then_some(timeout),
            success_check: cli.success_check,
            run_on_startup: cli.run_on_startup,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that would otherwise surface mid-run
    pub fn validate(&self) -> Result<()> {
        if self.label_prefix.is_empty() {
            return Err(anyhow!("LABEL_PREFIX must not be empty"));
        }

        if !self.backup_dir.is_absolute() {
            return Err(anyhow!(
                "BACKUP_DIR must be an absolute path, got {}",
                self.backup_dir.display()
            ));
        }

        CronSchedule::parse(&self.cron_schedule)
            .with_context(|| format!("Invalid CRON_SCHEDULE '{}'", self.cron_schedule))?;

        Ok(())
    }
}
