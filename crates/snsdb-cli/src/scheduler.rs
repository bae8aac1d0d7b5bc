//! Cron-driven ingest for long-running deployments.

use std::sync::Arc;

use snsdb_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Run an ingest pass for every configured platform on `ingest_cron` until
/// interrupted.
///
/// # Errors
///
/// Returns an error if the cron expression is invalid or the scheduler
/// cannot start. Failed ingest passes are logged and the schedule continues.
pub(crate) async fn run_schedule(config: AppConfig) -> anyhow::Result<()> {
    let cron = config.ingest_cron.clone();
    let config = Arc::new(config);

    let mut scheduler = JobScheduler::new().await?;
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let config = Arc::clone(&config);
        Box::pin(async move {
            tracing::info!("scheduler: starting ingest run");
            match crate::ingest::run_ingest(&config, &[]).await {
                Ok(()) => tracing::info!("scheduler: ingest run complete"),
                Err(e) => tracing::error!(error = %format!("{e:#}"), "scheduler: ingest run failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(%cron, "scheduler started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    scheduler.shutdown().await?;
    Ok(())
}
