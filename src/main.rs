use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use docker_backup_tool::cli::Cli;
use docker_backup_tool::core::{DockerRuntime, Scheduler, Selection};
use docker_backup_tool::utils::logging::init_tracing;
use docker_backup_tool::utils::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be populated
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = AppConfig::from_cli(&cli)?;
    info!(
        label_prefix = %config.label_prefix,
        backup_dir = %config.backup_dir.display(),
        schedule = %config.cron_schedule,
        "starting docker-backup-tool"
    );

    std::fs::create_dir_all(&config.backup_dir).with_context(|| {
        format!("Failed to create backup directory {}", config.backup_dir.display())
    })?;

    let runtime = DockerRuntime::connect()
        .await
        .context("Failed to connect to Docker daemon. Is the socket mounted?")?;

    let scheduler = Scheduler::new(config, Arc::new(runtime))?;

    if cli.once {
        let failed = match scheduler.run_once(&Selection::all()).await {
            Some(summary) => summary.has_failures(),
            None => false,
        };
        drop(scheduler);
        if failed {
            error!("one or more backups failed");
            std::process::exit(1);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested, finishing current run");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "cannot listen for SIGTERM, only Ctrl+C will stop the scheduler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
