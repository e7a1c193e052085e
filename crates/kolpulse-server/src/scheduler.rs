//! Background job scheduler.
//!
//! Registers the three periodic sweeps on their configured cron schedules.
//! Each job runs independently and only logs its outcome; a failed sweep is
//! retried at its next tick.

use chrono::Utc;
use kolpulse_collector::Orchestrator;
use kolpulse_core::AppConfig;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, a
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    orchestrator: Orchestrator,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_kol_sweep(&scheduler, orchestrator.clone(), &config.kol_sweep_cron).await?;
    register_status_sweep(&scheduler, orchestrator.clone(), &config.event_status_cron).await?;
    register_metrics_sweep(&scheduler, orchestrator, &config.event_metrics_cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_kol_sweep(
    scheduler: &JobScheduler,
    orchestrator: Orchestrator,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            tracing::info!("scheduler: starting kol collection sweep");
            match orchestrator.run_kol_sweep().await {
                Ok(report) => tracing::info!(
                    processed = report.processed,
                    failed = report.failed,
                    skipped = report.skipped,
                    "scheduler: kol collection sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: kol collection sweep failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered kol collection sweep");
    Ok(())
}

async fn register_status_sweep(
    scheduler: &JobScheduler,
    orchestrator: Orchestrator,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            match orchestrator.run_status_sweep(Utc::now()).await {
                Ok(report) => tracing::debug!(
                    activated = report.activated.len(),
                    completed = report.completed.len(),
                    resumed = report.resumed.len(),
                    stopped = report.stopped.len(),
                    failed = report.failed,
                    "scheduler: event status sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: event status sweep failed"),
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered event status sweep");
    Ok(())
}

async fn register_metrics_sweep(
    scheduler: &JobScheduler,
    orchestrator: Orchestrator,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            if let Err(e) = orchestrator.run_metrics_sweep().await {
                tracing::error!(error = %e, "scheduler: event metrics sweep failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered event metrics sweep");
    Ok(())
}
