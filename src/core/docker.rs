/// Docker integration
///
/// The pipeline talks to the container runtime only through the
/// [`ContainerRuntime`] trait: list containers, exec a shell command,
/// copy a path out of a container. [`DockerRuntime`] implements it on
/// top of the Docker Engine API.

use async_trait::async_trait;
use bollard::container::{DownloadFromContainerOptions, ListContainersOptions};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::ContainerSummary;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::core::error::{BackupError, Result};
use crate::utils::sanitize_container_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    /// Primary name without the leading `/`
    pub name: String,
    pub labels: HashMap<String, String>,
    pub state: String,
}

/// Combined stdout/stderr of an exec session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub output: String,
    /// `None` when the runtime could not report it
    pub exit_code: Option<i64>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All containers, running and stopped
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Run `sh -c <command>` inside a container and collect its output
    async fn exec(&self, container_id: &str, command: &str) -> Result<ExecOutput>;

    /// Copy `path` from the container filesystem into `host_dir`
    async fn copy_from_container(&self, container_id: &str, path: &str, host_dir: &Path)
        -> Result<()>;
}

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon and verify it answers
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        Ok(Self { docker })
    }

    /// Convert ContainerSummary to ContainerInfo
    fn container_summary_to_info(summary: ContainerSummary) -> ContainerInfo {
        let id = summary.id.unwrap_or_default();

        let name = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| sanitize_container_name(n))
            .unwrap_or_else(|| id.chars().take(12).collect());

        ContainerInfo {
            id,
            name,
            labels: summary.labels.unwrap_or_default(),
            state: summary.state.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let options = Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;

        Ok(containers
            .into_iter()
            .map(Self::container_summary_to_info)
            .collect())
    }

    async fn exec(&self, container_id: &str, command: &str) -> Result<ExecOutput> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(vec!["sh", "-c", command]),
                    ..Default::default()
                },
            )
            .await?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = stream.next().await {
                output.push_str(&chunk?.to_string());
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        debug!(container = container_id, exit_code = ?inspect.exit_code, "exec finished");

        Ok(ExecOutput {
            output,
            exit_code: inspect.exit_code,
        })
    }

    async fn copy_from_container(
        &self,
        container_id: &str,
        path: &str,
        host_dir: &Path,
    ) -> Result<()> {
        let stream = self.docker.download_from_container(
            container_id,
            Some(DownloadFromContainerOptions { path }),
        );
        futures::pin_mut!(stream);

        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            archive.extend_from_slice(&chunk?);
        }

        // The engine answers with a tar archive of the requested path
        let dest: PathBuf = host_dir.to_path_buf();
        tokio::task::spawn_blocking(move || tar::Archive::new(Cursor::new(archive)).unpack(dest))
            .await
            .map_err(|e| BackupError::Io(std::io::Error::new(ErrorKind::Other, e)))??;

        Ok(())
    }
}
