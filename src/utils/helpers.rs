/// Helper utilities shared by the backup pipeline

use chrono::{DateTime, SecondsFormat, Utc};

use crate::utils::ARTIFACT_SEPARATOR;

/// Filesystem-safe ISO-8601 timestamp, e.g. `2024-05-01T02-00-00-123Z`.
///
/// `:` and `.` are replaced by `-`; the fixed-width format keeps
/// lexicographic order equal to chronological order.
pub fn artifact_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Artifact file name for a container at a given instant
pub fn artifact_name(container_name: &str, at: DateTime<Utc>) -> String {
    format!("{}{}{}", container_name, ARTIFACT_SEPARATOR, artifact_timestamp(at))
}

/// Strip the leading `/` Docker puts in front of container names
pub fn sanitize_container_name(raw: &str) -> String {
    raw.trim_start_matches('/').to_string()
}

/// Trimmed value, or `None` when blank
pub fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// Quote a value for `sh -c`
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
