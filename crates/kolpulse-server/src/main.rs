mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use chrono::Utc;
use kolpulse_collector::Orchestrator;
use kolpulse_core::{AppConfig, StoreBackend};
use kolpulse_db::{MemoryStore, PgStore, Store};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = kolpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = open_store(&config).await?;
    let orchestrator = Orchestrator::from_config(&config, store)?;
    let startup = orchestrator.run_status_sweep(Utc::now()).await?;
    tracing::info!(
        resumed = startup.resumed.len(),
        activated = startup.activated.len(),
        completed = startup.completed.len(),
        "event monitoring restored"
    );
    let mut scheduler = scheduler::build_scheduler(orchestrator.clone(), &config).await?;

    let auth = AuthState::from_config(&config)?;
    let app = build_app(AppState::new(orchestrator.clone()), auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, store = %config.store, "kolpulse-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown();
    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler did not shut down cleanly");
    }
    Ok(())
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = kolpulse_db::connect_pool_from_config(config).await?;
            let applied = kolpulse_db::run_migrations(&pool).await?;
            tracing::info!(applied, "database migrations up to date");
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
