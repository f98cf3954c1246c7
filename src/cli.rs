/// CLI argument parsing
///
/// Every flag can also be supplied through the environment, which is how
/// the tool is normally configured inside a container.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::utils::{
    LogFormat, SuccessCheckKind, DEFAULT_BACKUP_DIR, DEFAULT_BACKUP_TIMEOUT, DEFAULT_CRON_SCHEDULE,
    DEFAULT_LABEL_PREFIX,
};

#[derive(Parser, Debug)]
#[command(name = "docker-backup-tool")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Namespace of the backup labels
    #[arg(long, env = "LABEL_PREFIX", default_value = DEFAULT_LABEL_PREFIX)]
    pub label_prefix: String,

    /// Host directory receiving one sub-directory per container
    #[arg(long, env = "BACKUP_DIR", default_value = DEFAULT_BACKUP_DIR)]
    pub backup_dir: PathBuf,

    /// Global cron expression (5 or 6 fields)
    #[arg(long, env = "CRON_SCHEDULE", default_value = DEFAULT_CRON_SCHEDULE)]
    pub cron_schedule: String,

    /// Per-container timeout (e.g. "30m", "2h"); "0s" disables it
    #[arg(long, env = "BACKUP_TIMEOUT", default_value = DEFAULT_BACKUP_TIMEOUT)]
    pub timeout: String,

    /// How command results are judged
    #[arg(long, env = "SUCCESS_CHECK", value_enum, default_value_t = SuccessCheckKind::Output)]
    pub success_check: SuccessCheckKind,

    /// Run a backup immediately at startup
    #[arg(long, env = "RUN_ON_STARTUP", default_value_t = true, action = ArgAction::Set)]
    pub run_on_startup: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Run a single backup pass and exit (non-zero if any container failed)
    #[arg(long)]
    pub once: bool,
}
