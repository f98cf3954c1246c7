//! Label-driven scheduled backups for Docker containers.
//!
//! Containers opt in with `docker-backup-tool.backup=true` and name a
//! backup command with `docker-backup-tool.command`. On every cron tick
//! the command runs inside the container, its output file is copied to
//! `{BACKUP_DIR}/{container}/{container}_{timestamp}` and old artifacts
//! beyond the retention count are removed.

pub mod cli;
pub mod core;
pub mod utils;
