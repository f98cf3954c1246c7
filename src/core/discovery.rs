/// Container discovery
///
/// Lists every container known to the runtime (including stopped ones)
/// and keeps those opted in with `{prefix}.backup=true`.

use std::sync::Arc;
use tracing::debug;

use crate::core::docker::{ContainerInfo, ContainerRuntime};
use crate::core::error::{BackupError, Result};
use crate::core::labels::is_enabled;

pub struct Discovery {
    runtime: Arc<dyn ContainerRuntime>,
    label_prefix: String,
}

impl Discovery {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, label_prefix: impl Into<String>) -> Self {
        Self {
            runtime,
            label_prefix: label_prefix.into(),
        }
    }

    /// Containers eligible for backup.
    ///
    /// A runtime failure is returned as [`BackupError::Discovery`]; the
    /// caller treats it as an empty tick.
    pub async fn list_backup_candidates(&self) -> Result<Vec<ContainerInfo>> {
        let containers = self
            .runtime
            .list_containers()
            .await
            .map_err(|e| BackupError::Discovery(e.to_string()))?;

        let total = containers.len();
        let candidates: Vec<ContainerInfo> = containers
            .into_iter()
            .filter(|c| is_enabled(&c.labels, &self.label_prefix))
            .collect();

        for candidate in &candidates {
            debug!(container = %candidate.name, state = %candidate.state, "backup candidate");
        }
        debug!(total, candidates = candidates.len(), "containers discovered");
        Ok(candidates)
    }
}
