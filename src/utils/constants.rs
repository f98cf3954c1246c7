/// Defaults and label names for the backup tool
///
/// Every backup behaviour is driven by container labels of the form
/// `{prefix}{suffix}`, e.g. `docker-backup-tool.command`.

/// Default label namespace
pub const DEFAULT_LABEL_PREFIX: &str = "docker-backup-tool";

/// Default host directory holding one sub-directory per container
pub const DEFAULT_BACKUP_DIR: &str = "/backups";

/// Default global schedule (every day at 02:00)
pub const DEFAULT_CRON_SCHEDULE: &str = "0 2 * * *";

/// Default per-container timeout, in humantime syntax
pub const DEFAULT_BACKUP_TIMEOUT: &str = "1h";

/// Default in-container directory the backup command writes into
pub const DEFAULT_LOCATION: &str = "/tmp/backup";

/// Default number of artifacts kept per container
pub const DEFAULT_RETENTION: usize = 7;

/// Separator between container name and timestamp in artifact names.
/// Retention only considers entries containing it.
pub const ARTIFACT_SEPARATOR: char = '_';

/// Status file written into the backup root after every run
pub const STATUS_FILE_NAME: &str = ".last-run.json";

/// Label suffixes
pub const LABEL_BACKUP: &str = ".backup";
pub const LABEL_COMMAND: &str = ".command";
pub const LABEL_LOCATION: &str = ".location";
pub const LABEL_RETENTION: &str = ".retention";
pub const LABEL_PRE_COMMAND: &str = ".pre_command";
pub const LABEL_POST_COMMAND: &str = ".post_command";
pub const LABEL_SCHEDULE: &str = ".schedule";

/// Build a full label key from a prefix and suffix
pub fn label_key(prefix: &str, suffix: &str) -> String {
    format!("{}{}", prefix, suffix)
}
