/// Scheduled backup runs
///
/// Owns the container runtime for the lifetime of the process. Each
/// trigger runs discovery, then extracts configuration and backs up
/// every selected container one after another. Only one run can be
/// active at a time; triggers arriving meanwhile are skipped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::discovery::Discovery;
use crate::core::docker::ContainerRuntime;
use crate::core::error::{BackupError, Result};
use crate::core::executor::Executor;
use crate::core::labels::BackupConfig;
use crate::core::schedule::{next_fire, CronSchedule, ScheduleIndex, Selection};
use crate::utils::{AppConfig, STATUS_FILE_NAME};

/// Outcome for one container in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRunResult {
    pub container_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub selection: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<BackupRunResult>,
    /// Enabled containers skipped for configuration defects
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn successful(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

pub struct Scheduler {
    config: AppConfig,
    global: CronSchedule,
    discovery: Discovery,
    executor: Executor,
    index: Mutex<ScheduleIndex>,
    busy: tokio::sync::Mutex<()>,
}

impl Scheduler {
    pub fn new(config: AppConfig, runtime: Arc<dyn ContainerRuntime>) -> Result<Self> {
        let global = CronSchedule::parse(&config.cron_schedule)?;
        let discovery = Discovery::new(runtime.clone(), config.label_prefix.clone());
        let executor = Executor::new(runtime, &config.backup_dir, config.success_check.build());

        Ok(Self {
            config,
            global,
            discovery,
            executor,
            index: Mutex::new(ScheduleIndex::default()),
            busy: tokio::sync::Mutex::new(()),
        })
    }

    /// Per-container schedules seen by the latest discovery
    pub fn schedule_index(&self) -> ScheduleIndex {
        self.index.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run the pipeline once for the selected containers.
    ///
    /// Returns `None` without doing anything when another run is active.
    pub async fn run_once(&self, selection: &Selection) -> Option<RunSummary> {
        let Ok(_guard) = self.busy.try_lock() else {
            warn!(%selection, "previous backup run still in progress, skipping trigger");
            return None;
        };

        let summary = self.run_pipeline(selection).await;
        self.write_status(&summary).await;
        Some(summary)
    }

    /// Fire on every schedule until `shutdown` turns true.
    ///
    /// A run in progress when shutdown is requested is allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(schedule = %self.global, "scheduler started");

        if self.config.run_on_startup {
            self.run_once(&Selection::all()).await;
        } else {
            self.refresh_index().await;
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now();
            let Some((at, selection)) = next_fire(&self.global, &self.schedule_index(), now) else {
                warn!("no upcoming trigger, stopping scheduler");
                break;
            };

            let wait = remaining_wait(at, now).unwrap_or_default();
            info!(next_run = %at, %selection, "waiting for next trigger");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    // The sleep is monotonic; a wall clock stepped back
                    // means the trigger is not due yet.
                    if let Some(left) = remaining_wait(at, Utc::now()) {
                        debug!(next_run = %at, remaining = ?left, "woke before trigger");
                        continue;
                    }
                    self.run_once(&selection).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("scheduler stopped");
    }

    async fn run_pipeline(&self, selection: &Selection) -> RunSummary {
        let started_at = Utc::now();
        info!(%selection, "backup run started");

        let configs = self.discover().await.unwrap_or_default();
        let index = self.schedule_index();

        let mut results = Vec::new();
        let mut skipped = Vec::new();

        for config in &configs {
            if !selection.includes(index.schedule_for(&config.container_name)) {
                debug!(container = %config.container_name, "not selected by this trigger");
                continue;
            }

            if !config.enabled {
                info!(container = %config.container_name, "backup disabled, skipping");
                skipped.push(config.container_name.clone());
                continue;
            }

            if config.command.is_none() {
                warn!(container = %config.container_name, "no backup command label, skipping");
                skipped.push(config.container_name.clone());
                continue;
            }

            results.push(self.backup_container(config).await);
        }

        let summary = RunSummary {
            selection: selection.to_string(),
            started_at,
            finished_at: Utc::now(),
            results,
            skipped,
        };

        info!(
            successful = summary.successful(),
            failed = summary.failed(),
            skipped = summary.skipped.len(),
            "backup run finished"
        );

        summary
    }

    /// Discover candidates, extract their configuration and refresh the
    /// schedule index. `None` when the runtime could not be queried.
    async fn discover(&self) -> Option<Vec<BackupConfig>> {
        let candidates = match self.discovery.list_backup_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "container discovery failed");
                return None;
            }
        };

        let configs: Vec<BackupConfig> = candidates
            .iter()
            .map(|c| BackupConfig::from_container(c, &self.config.label_prefix))
            .collect();

        let index = ScheduleIndex::build(&configs);
        if !index.is_empty() {
            debug!(schedules = index.len(), "per-container schedules indexed");
        }
        *self.index.lock().unwrap_or_else(|e| e.into_inner()) = index;

        Some(configs)
    }

    async fn refresh_index(&self) {
        self.discover().await;
    }

    async fn backup_container(&self, config: &BackupConfig) -> BackupRunResult {
        info!(container = %config.container_name, "starting backup");

        let outcome = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.executor.execute(config))
                .await
                .unwrap_or_else(|_| {
                    Err(BackupError::Timeout {
                        container: config.container_name.clone(),
                        elapsed: limit,
                    })
                }),
            None => self.executor.execute(config).await,
        };

        match outcome {
            Ok(artifact) => BackupRunResult {
                container_name: config.container_name.clone(),
                success: true,
                artifact: Some(artifact.path),
                error: None,
            },
            Err(e) => {
                error!(
                    container = %config.container_name,
                    stage = ?e.stage(),
                    error = %e,
                    "backup failed"
                );
                BackupRunResult {
                    container_name: config.container_name.clone(),
                    success: false,
                    artifact: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn write_status(&self, summary: &RunSummary) {
        let path = self.config.backup_dir.join(STATUS_FILE_NAME);

        let contents = match serde_json::to_vec_pretty(summary) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "failed to serialize run summary");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&path, contents).await {
            warn!(file = %path.display(), error = %e, "failed to write run status");
        }
    }
}

/// Time left until `at`, or `None` once it is due
fn remaining_wait(at: DateTime<Utc>, now: DateTime<Utc>) -> Option<std::time::Duration> {
    if now >= at {
        return None;
    }
    (at - now).to_std().ok()
}
