/// Label-to-configuration mapping
///
/// Turns a container's label set into a [`BackupConfig`]. Extraction is
/// total: missing or malformed optional labels fall back to defaults
/// instead of failing the run.

use std::collections::HashMap;
use tracing::warn;

use crate::core::docker::ContainerInfo;
use crate::utils::{
    label_key, non_blank, sanitize_container_name, DEFAULT_LOCATION, DEFAULT_RETENTION,
    LABEL_BACKUP, LABEL_COMMAND, LABEL_LOCATION, LABEL_POST_COMMAND, LABEL_PRE_COMMAND,
    LABEL_RETENTION, LABEL_SCHEDULE,
};

/// Per-container backup settings, derived fresh on every run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub container_id: String,
    /// Sanitized name, also the host directory key
    pub container_name: String,
    pub enabled: bool,
    pub command: Option<String>,
    pub location: String,
    pub schedule: Option<String>,
    /// Always >= 1
    pub retention: usize,
    pub pre_command: Option<String>,
    pub post_command: Option<String>,
}

impl BackupConfig {
    pub fn from_container(container: &ContainerInfo, prefix: &str) -> Self {
        let labels = LabelReader {
            labels: &container.labels,
            prefix,
        };
        let container_name = sanitize_container_name(&container.name);

        let retention = parse_retention(labels.raw(LABEL_RETENTION).map(String::as_str))
            .unwrap_or_else(|| {
                if let Some(raw) = labels.raw(LABEL_RETENTION) {
                    warn!(
                        container = %container_name,
                        value = %raw,
                        "invalid retention label, using default of {}",
                        DEFAULT_RETENTION
                    );
                }
                DEFAULT_RETENTION
            });

        Self {
            container_id: container.id.clone(),
            enabled: is_enabled(&container.labels, prefix),
            command: labels.value(LABEL_COMMAND),
            location: labels
                .value(LABEL_LOCATION)
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            schedule: labels.value(LABEL_SCHEDULE),
            retention,
            pre_command: labels.value(LABEL_PRE_COMMAND),
            post_command: labels.value(LABEL_POST_COMMAND),
            container_name,
        }
    }
}

/// `{prefix}.backup` must be exactly the string "true"
pub fn is_enabled(labels: &HashMap<String, String>, prefix: &str) -> bool {
    labels
        .get(&label_key(prefix, LABEL_BACKUP))
        .is_some_and(|v| v == "true")
}

/// Retention count, or `None` when absent, non-numeric or below 1
fn parse_retention(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

struct LabelReader<'a> {
    labels: &'a HashMap<String, String>,
    prefix: &'a str,
}

impl LabelReader<'_> {
    fn raw(&self, suffix: &str) -> Option<&String> {
        self.labels.get(&label_key(self.prefix, suffix))
    }

    fn value(&self, suffix: &str) -> Option<String> {
        non_blank(self.raw(suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "docker-backup-tool";

    fn container(labels: &[(&str, &str)]) -> ContainerInfo {
        ContainerInfo {
            id: "abc123".to_string(),
            name: "/mysql-app".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (format!("{}{}", PREFIX, k), v.to_string()))
                .collect(),
            state: "running".to_string(),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = BackupConfig::from_container(
            &container(&[(".backup", "true"), (".command", "mysqldump db")]),
            PREFIX,
        );

        assert!(config.enabled);
        assert_eq!(config.container_id, "abc123");
        assert_eq!(config.container_name, "mysql-app");
        assert_eq!(config.command.as_deref(), Some("mysqldump db"));
        assert_eq!(config.location, "/tmp/backup");
        assert_eq!(config.retention, 7);
        assert_eq!(config.schedule, None);
        assert_eq!(config.pre_command, None);
        assert_eq!(config.post_command, None);
    }

    #[test]
    fn test_all_labels_read() {
        let config = BackupConfig::from_container(
            &container(&[
                (".backup", "true"),
                (".command", "pg_dumpall"),
                (".location", "/var/backups"),
                (".retention", "3"),
                (".schedule", "0 4 * * *"),
                (".pre_command", "sync"),
                (".post_command", "rm -f /var/backups/*"),
            ]),
            PREFIX,
        );

        assert_eq!(config.location, "/var/backups");
        assert_eq!(config.retention, 3);
        assert_eq!(config.schedule.as_deref(), Some("0 4 * * *"));
        assert_eq!(config.pre_command.as_deref(), Some("sync"));
        assert_eq!(config.post_command.as_deref(), Some("rm -f /var/backups/*"));
    }

    #[test]
    fn test_non_numeric_retention_defaults() {
        for raw in ["abc", "", "3.5", "-2", "NaN"] {
            let config = BackupConfig::from_container(
                &container(&[(".backup", "true"), (".retention", raw)]),
                PREFIX,
            );
            assert_eq!(config.retention, 7, "retention label {:?}", raw);
        }
    }

    #[test]
    fn test_zero_retention_defaults_instead_of_zero() {
        let config = BackupConfig::from_container(
            &container(&[(".backup", "true"), (".retention", "0")]),
            PREFIX,
        );
        assert_eq!(config.retention, 7);
    }

    #[test]
    fn test_missing_command_is_none() {
        let config = BackupConfig::from_container(&container(&[(".backup", "true")]), PREFIX);
        assert_eq!(config.command, None);

        let blank = BackupConfig::from_container(
            &container(&[(".backup", "true"), (".command", "   ")]),
            PREFIX,
        );
        assert_eq!(blank.command, None);
    }

    #[test]
    fn test_enabled_requires_exact_true() {
        for raw in ["TRUE", "True", "yes", "1", " true"] {
            let config = BackupConfig::from_container(&container(&[(".backup", raw)]), PREFIX);
            assert!(!config.enabled, "backup label {:?}", raw);
        }
    }

    #[test]
    fn test_custom_prefix_ignores_default_labels() {
        let config = BackupConfig::from_container(
            &container(&[(".backup", "true"), (".command", "echo hi")]),
            "acme",
        );
        assert!(!config.enabled);
        assert_eq!(config.command, None);
    }
}
