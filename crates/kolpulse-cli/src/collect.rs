//! Collection and sweep command handlers for the CLI.
//!
//! Each command runs once against the configured store and Source Feed and
//! exits; nothing is left monitoring afterwards.

use chrono::Utc;
use clap::Subcommand;
use kolpulse_collector::Orchestrator;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum CollectCommands {
    /// Fetch, score, and store a KOL's recent posts, then recompute its scores
    Kol { username: String },
    /// Run a single monitoring tick for an event
    Event { event_id: Uuid },
}

#[derive(Debug, Subcommand)]
pub enum SweepCommands {
    /// Collect posts for every active KOL
    Kols,
    /// Activate and complete events whose window has been entered or left
    Status,
    /// Recompute the metrics of every active event
    Metrics,
}

/// # Errors
///
/// Returns an error if the KOL or event is unknown, or the feed or store
/// fails.
pub(crate) async fn run_collect(
    orchestrator: &Orchestrator,
    command: CollectCommands,
) -> anyhow::Result<()> {
    match command {
        CollectCommands::Kol { username } => {
            let collection = orchestrator.collect_kol_data(&username).await?;
            println!(
                "{}: fetched {} post(s), stored {}; emotion score {:.2}, influence {:.2}",
                collection.username,
                collection.fetched,
                collection.stored,
                collection.kol.emotion_score,
                collection.kol.influence_score
            );
        }
        CollectCommands::Event { event_id } => {
            let terms = orchestrator.event_search_terms(event_id).await?;
            if terms.is_empty() {
                println!("event {event_id} has no search terms; nothing to collect");
                return Ok(());
            }
            let stored = orchestrator.collect_event_posts(event_id, &terms).await?;
            println!(
                "event {event_id}: stored {stored} post(s) for [{}]",
                terms.join(", ")
            );
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error only if the sweep cannot read its candidates. Per-item
/// failures are counted in the printed summary.
pub(crate) async fn run_sweep(
    orchestrator: &Orchestrator,
    command: SweepCommands,
) -> anyhow::Result<()> {
    match command {
        SweepCommands::Kols => {
            let report = orchestrator.run_kol_sweep().await?;
            println!(
                "kol sweep: processed={} failed={} skipped={}",
                report.processed, report.failed, report.skipped
            );
        }
        SweepCommands::Status => {
            let report = orchestrator.run_status_sweep(Utc::now()).await?;
            println!(
                "status sweep: activated={} completed={} resumed={} stopped={} failed={}",
                report.activated.len(),
                report.completed.len(),
                report.resumed.len(),
                report.stopped.len(),
                report.failed
            );
            // Loops started here would die with the process; the server owns them.
            orchestrator.shutdown();
        }
        SweepCommands::Metrics => {
            let report = orchestrator.run_metrics_sweep().await?;
            println!(
                "metrics sweep: updated={} without_records={} failed={}",
                report.processed, report.skipped, report.failed
            );
        }
    }
    Ok(())
}
