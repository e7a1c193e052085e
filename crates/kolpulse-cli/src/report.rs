//! Read-only aggregate views printed as plain-text tables.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use kolpulse_analytics::Aggregator;
use kolpulse_core::{Granularity, Window};
use kolpulse_db::Store;
use uuid::Uuid;

/// Window filters shared by every report.
#[derive(Debug, Clone, Default, Args)]
pub struct WindowArgs {
    /// Inclusive lower bound on `analyzed_at` (RFC 3339)
    #[arg(long)]
    pub start_date: Option<DateTime<Utc>>,

    /// Inclusive upper bound on `analyzed_at` (RFC 3339)
    #[arg(long)]
    pub end_date: Option<DateTime<Utc>>,

    #[arg(long)]
    pub event_id: Option<Uuid>,

    #[arg(long)]
    pub kol_id: Option<Uuid>,
}

impl From<WindowArgs> for Window {
    fn from(args: WindowArgs) -> Self {
        Self {
            start_date: args.start_date,
            end_date: args.end_date,
            event_id: args.event_id,
            kol_id: args.kol_id,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Record count, sentiment distribution, and mean scores
    Stats {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Mean scores per time bucket
    Trends {
        #[command(flatten)]
        window: WindowArgs,

        /// hour, day, week, or month
        #[arg(long, default_value = "day")]
        granularity: Granularity,
    },
    /// Hour-of-day by sentiment grid
    Heatmap {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// KOLs ranked by influence
    Ranking {
        #[command(flatten)]
        window: WindowArgs,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Per-event sentiment means
    Compare {
        #[command(flatten)]
        window: WindowArgs,

        /// Comma-separated event ids; all events when omitted
        #[arg(long, value_delimiter = ',')]
        event_ids: Vec<Uuid>,
    },
}

/// # Errors
///
/// Returns an error if the store scan fails.
pub(crate) async fn run_report(store: Arc<dyn Store>, command: ReportCommands) -> anyhow::Result<()> {
    let aggregator = Aggregator::new(store);
    match command {
        ReportCommands::Stats { window } => print_stats(&aggregator, &window.into()).await,
        ReportCommands::Trends {
            window,
            granularity,
        } => print_trends(&aggregator, &window.into(), granularity).await,
        ReportCommands::Heatmap { window } => print_heatmap(&aggregator, &window.into()).await,
        ReportCommands::Ranking { window, limit } => {
            print_ranking(&aggregator, &window.into(), limit).await
        }
        ReportCommands::Compare { window, event_ids } => {
            print_comparison(&aggregator, &window.into(), &event_ids).await
        }
    }
}

async fn print_stats(aggregator: &Aggregator, window: &Window) -> anyhow::Result<()> {
    let stats = aggregator.stats(window).await?;
    println!("records: {}", stats.total);
    println!("{:<12}COUNT", "SENTIMENT");
    for (sentiment, count) in &stats.sentiment_distribution {
        println!("{sentiment:<12}{count}");
    }
    let means = &stats.average_scores;
    println!(
        "mean scores: positive={:.3} negative={:.3} neutral={:.3} overall={:.3}",
        means.positive, means.negative, means.neutral, means.overall
    );
    Ok(())
}

async fn print_trends(
    aggregator: &Aggregator,
    window: &Window,
    granularity: Granularity,
) -> anyhow::Result<()> {
    let buckets = aggregator.trends(window, granularity).await?;
    if buckets.is_empty() {
        println!("no records in window");
        return Ok(());
    }
    println!(
        "{:<18}{:<10}{:<10}{:<10}{:<10}COUNT",
        "BUCKET", "POSITIVE", "NEGATIVE", "NEUTRAL", "OVERALL"
    );
    for bucket in &buckets {
        println!(
            "{:<18}{:<10.3}{:<10.3}{:<10.3}{:<10.3}{}",
            bucket.time.format("%Y-%m-%d %H:%M").to_string(),
            bucket.positive,
            bucket.negative,
            bucket.neutral,
            bucket.overall,
            bucket.count
        );
    }
    Ok(())
}

async fn print_heatmap(aggregator: &Aggregator, window: &Window) -> anyhow::Result<()> {
    let heatmap = aggregator.heatmap(window).await?;
    println!("{:<6}{:<12}{:<10}COUNT", "HOUR", "SENTIMENT", "VALUE");
    for cell in heatmap.data.iter().filter(|cell| cell.count > 0) {
        println!(
            "{:<6}{:<12}{:<10.1}{}",
            cell.hour,
            cell.sentiment.to_string(),
            cell.value,
            cell.count
        );
    }
    let summary = &heatmap.summary;
    println!(
        "analyzed={} peak_hour={} dominant={}",
        summary.total_analyzed, summary.peak_hour, summary.dominant_sentiment
    );
    Ok(())
}

async fn print_ranking(aggregator: &Aggregator, window: &Window, limit: usize) -> anyhow::Result<()> {
    let rows = aggregator.kol_influence(window, Some(limit)).await?;
    if rows.is_empty() {
        println!("no KOL records in window");
        return Ok(());
    }
    println!(
        "{:<25}{:<8}{:<10}{:<6}{:<6}INFLUENCE",
        "KOL", "POSTS", "AVG", "POS", "NEG"
    );
    for row in &rows {
        let label = row
            .username
            .clone()
            .unwrap_or_else(|| format!("kol:{}", row.kol_id));
        println!(
            "{:<25}{:<8}{:<10.3}{:<6}{:<6}{:.2}",
            label,
            row.post_count,
            row.avg_sentiment,
            row.positive_count,
            row.negative_count,
            row.influence_score
        );
    }
    Ok(())
}

async fn print_comparison(
    aggregator: &Aggregator,
    window: &Window,
    event_ids: &[Uuid],
) -> anyhow::Result<()> {
    let rows = aggregator.event_comparison(window, event_ids).await?;
    if rows.is_empty() {
        println!("no event records in window");
        return Ok(());
    }
    println!(
        "{:<38}{:<10}{:<10}{:<10}POSTS",
        "EVENT", "POSITIVE", "NEGATIVE", "NEUTRAL"
    );
    for row in &rows {
        let label = row
            .event_name
            .clone()
            .unwrap_or_else(|| row.event_id.to_string());
        println!(
            "{:<38}{:<10.3}{:<10.3}{:<10.3}{}",
            label, row.positive, row.negative, row.neutral, row.total_posts
        );
    }
    Ok(())
}
