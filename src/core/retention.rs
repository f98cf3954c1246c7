/// Retention of host-side artifacts
///
/// Keeps the `retention` most recently modified artifacts of a container
/// directory and deletes the rest. Only entries containing the artifact
/// separator are considered; anything else in the directory is left alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::core::error::Result;
use crate::utils::ARTIFACT_SEPARATOR;

/// Outcome of a prune pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

struct Candidate {
    path: PathBuf,
    name: String,
    modified: SystemTime,
    is_dir: bool,
}

/// Delete every artifact beyond the `retention` newest ones.
///
/// Listing the directory is the only fatal error; individual deletions
/// that fail are logged and reported in [`PruneReport::failed`].
pub fn prune(directory: &Path, retention: usize) -> Result<PruneReport> {
    prune_with(directory, retention, remove_artifact)
}

fn remove_artifact(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// [`prune`] with the deletion of each surplus artifact delegated to
/// `remove`, which receives the path and whether it is a directory.
pub fn prune_with<F>(directory: &Path, retention: usize, mut remove: F) -> Result<PruneReport>
where
    F: FnMut(&Path, bool) -> io::Result<()>,
{
    let retention = retention.max(1);
    let mut candidates = Vec::new();

    for entry in fs::read_dir(directory)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %directory.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        if !name.contains(ARTIFACT_SEPARATOR) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(file = %name, error = %e, "cannot stat artifact, leaving it in place");
                continue;
            }
        };

        candidates.push(Candidate {
            path: entry.path(),
            name,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: metadata.is_dir(),
        });
    }

    // Newest first; equal mtimes fall back to the (sortable) name
    candidates.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });

    let mut report = PruneReport {
        kept: candidates.len().min(retention),
        ..Default::default()
    };

    if candidates.len() <= retention {
        debug!(dir = %directory.display(), count = candidates.len(), retention, "nothing to prune");
        return Ok(report);
    }

    for candidate in candidates.into_iter().skip(retention) {
        match remove(&candidate.path, candidate.is_dir) {
            Ok(()) => {
                info!(file = %candidate.path.display(), "removed old backup");
                report.removed.push(candidate.path);
            }
            Err(e) => {
                warn!(file = %candidate.path.display(), error = %e, "failed to remove old backup");
                report.failed.push(candidate.path);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Create an artifact whose mtime is `age_secs` in the past
    fn artifact(dir: &Path, name: &str, age_secs: u64) {
        let file = File::create(dir.join(name)).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_keeps_most_recently_modified() {
        let dir = TempDir::new().unwrap();
        // Names deliberately disagree with mtimes
        artifact(dir.path(), "app_a", 10);
        artifact(dir.path(), "app_b", 500);
        artifact(dir.path(), "app_c", 20);
        artifact(dir.path(), "app_d", 400);
        artifact(dir.path(), "app_e", 300);

        let report = prune(dir.path(), 2).unwrap();

        assert_eq!(report.kept, 2);
        assert_eq!(report.removed.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(listing(dir.path()), vec!["app_a", "app_c"]);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let dir = TempDir::new().unwrap();
        for (i, name) in ["app_1", "app_2", "app_3", "app_4"].iter().enumerate() {
            artifact(dir.path(), name, (i as u64 + 1) * 60);
        }

        prune(dir.path(), 3).unwrap();
        let first = listing(dir.path());

        let report = prune(dir.path(), 3).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(listing(dir.path()), first);
        assert_eq!(first, vec!["app_1", "app_2", "app_3"]);
    }

    #[test]
    fn test_entries_without_separator_are_ignored() {
        let dir = TempDir::new().unwrap();
        artifact(dir.path(), "notes.txt", 1000);
        artifact(dir.path(), "app_1", 30);
        artifact(dir.path(), "app_2", 20);
        artifact(dir.path(), "app_3", 10);

        let report = prune(dir.path(), 1).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert_eq!(listing(dir.path()), vec!["app_3", "notes.txt"]);
    }

    #[test]
    fn test_under_retention_is_noop() {
        let dir = TempDir::new().unwrap();
        artifact(dir.path(), "app_1", 10);
        artifact(dir.path(), "app_2", 20);

        let report = prune(dir.path(), 7).unwrap();
        assert_eq!(report.kept, 2);
        assert!(report.removed.is_empty());
        assert_eq!(listing(dir.path()).len(), 2);
    }

    #[test]
    fn test_directory_artifacts_removed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("app_old")).unwrap();
        File::create(dir.path().join("app_old").join("dump.sql")).unwrap();
        artifact(dir.path(), "app_new", 0);
        // Push the directory into the past so it is the oldest
        let old = File::open(dir.path().join("app_old")).unwrap();
        old.set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();

        let report = prune(dir.path(), 1).unwrap();
        assert_eq!(report.removed, vec![dir.path().join("app_old")]);
        assert_eq!(listing(dir.path()), vec!["app_new"]);
    }

    #[test]
    fn test_failed_removal_does_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        artifact(dir.path(), "app_1", 10);
        artifact(dir.path(), "app_2", 20);
        artifact(dir.path(), "app_3", 30);
        artifact(dir.path(), "app_4", 40);

        let stuck = dir.path().join("app_2");
        let mut attempted = Vec::new();
        let report = prune_with(dir.path(), 1, |path, is_dir| {
            attempted.push(path.to_path_buf());
            if path == stuck.as_path() {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            remove_artifact(path, is_dir)
        })
        .unwrap();

        assert_eq!(
            attempted,
            vec![stuck.clone(), dir.path().join("app_3"), dir.path().join("app_4")]
        );
        assert_eq!(report.failed, vec![stuck]);
        assert_eq!(
            report.removed,
            vec![dir.path().join("app_3"), dir.path().join("app_4")]
        );
        assert_eq!(listing(dir.path()), vec!["app_1", "app_2"]);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(prune(&dir.path().join("missing"), 3).is_err());
    }
}
