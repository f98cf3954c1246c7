/// Error taxonomy of the backup pipeline

use std::fmt;
use std::time::Duration;

/// Pipeline step an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PreCommand,
    Command,
    Extract,
    PostCommand,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::PreCommand => "pre_command",
            Stage::Command => "command",
            Stage::Extract => "extract",
            Stage::PostCommand => "post_command",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Docker API error: {0}")]
    Runtime(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Container {0} has no backup command")]
    MissingCommand(String),

    #[error("{stage} failed in {container}: {output}")]
    CommandFailed {
        stage: Stage,
        container: String,
        output: String,
    },

    #[error("Failed to extract {artifact} from {container}: {reason}")]
    Extraction {
        container: String,
        artifact: String,
        reason: String,
    },

    #[error("Backup of {container} timed out after {elapsed:?}")]
    Timeout { container: String, elapsed: Duration },
}

impl BackupError {
    /// Pipeline stage, when the error is tied to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BackupError::CommandFailed { stage, .. } => Some(*stage),
            BackupError::Extraction { .. } => Some(Stage::Extract),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
