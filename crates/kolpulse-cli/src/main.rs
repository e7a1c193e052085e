mod collect;
mod report;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use kolpulse_collector::Orchestrator;
use kolpulse_core::{AppConfig, StoreBackend};
use kolpulse_db::{MemoryStore, PgStore, Store};
use tracing_subscriber::EnvFilter;

use crate::collect::{CollectCommands, SweepCommands};
use crate::report::ReportCommands;

#[derive(Debug, Parser)]
#[command(name = "kolpulse-cli")]
#[command(about = "KOL Pulse command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Collect posts for a single KOL or event
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },
    /// Run one pass of a scheduled sweep
    Sweep {
        #[command(subcommand)]
        command: SweepCommands,
    },
    /// Print aggregate views over stored emotion records
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Score a text with the lexicon and store the result
    Analyze {
        text: String,

        /// Language tag stored with the record
        #[arg(long)]
        language: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("kolpulse-cli: no command given; see --help");
        return Ok(());
    };

    let config = kolpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Collect { command } => {
            let orchestrator = build_orchestrator(&config).await?;
            let result = collect::run_collect(&orchestrator, command).await;
            orchestrator.shutdown();
            result
        }
        Commands::Sweep { command } => {
            let orchestrator = build_orchestrator(&config).await?;
            let result = collect::run_sweep(&orchestrator, command).await;
            orchestrator.shutdown();
            result
        }
        Commands::Report { command } => {
            let store = open_store(&config).await?;
            report::run_report(store, command).await
        }
        Commands::Analyze { text, language } => {
            let orchestrator = build_orchestrator(&config).await?;
            let record = orchestrator.analyze_text(&text, language).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}

async fn run_db(config: &AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let pool = kolpulse_db::connect_pool_from_config(config).await?;
    match command {
        DbCommands::Migrate => {
            let applied = kolpulse_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Ping => {
            kolpulse_db::ping(&pool).await?;
            println!("database reachable");
        }
    }
    Ok(())
}

/// Opens the configured store. Postgres migrations are left to `db migrate`.
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; nothing outlives this command");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = kolpulse_db::connect_pool_from_config(config).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let store = open_store(config).await?;
    Ok(Orchestrator::from_config(config, store)?)
}
