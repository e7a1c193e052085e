//! The Collection Orchestrator: owns the KOL pipeline, the event state
//! machine, per-event monitoring, and the three periodic sweeps.
//!
//! KOL and event responsibilities live in sibling modules as further `impl`
//! blocks on [`Orchestrator`]; nothing here depends on the HTTP layer.

mod events;
mod kols;
mod posts;

use std::sync::Arc;
use std::time::Duration;

use kolpulse_analytics::InfluenceCalculator;
use kolpulse_core::AppConfig;
use kolpulse_db::Store;
use kolpulse_scoring::ScoringEngine;
use serde::Serialize;

use crate::error::CollectError;
use crate::feed::{feed_from_config, SourceFeed};
use crate::monitor::Monitors;

pub use events::StatusSweepReport;
pub use kols::{BatchImportReport, KolCollection};

/// Tunable collection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectorSettings {
    /// Pause between KOLs in a sweep, to respect feed rate limits.
    pub inter_kol_delay: Duration,
    /// Tick of each per-event monitoring loop.
    pub event_poll_interval: Duration,
    pub activity_coefficient: f64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            inter_kol_delay: Duration::from_secs(2),
            event_poll_interval: Duration::from_secs(300),
            activity_coefficient: 1.0,
        }
    }
}

impl CollectorSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            inter_kol_delay: Duration::from_millis(config.inter_kol_delay_ms),
            event_poll_interval: Duration::from_secs(config.event_poll_interval_secs),
            activity_coefficient: config.activity_coefficient,
        }
    }
}

/// Outcome of one sweep over independent units of work. Failed units are
/// logged and counted, never propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Cheap to clone; clones share the store, feed, engine, and monitors.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    feed: Arc<dyn SourceFeed>,
    engine: Arc<ScoringEngine>,
    influence: InfluenceCalculator,
    monitors: Arc<Monitors>,
    settings: CollectorSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        feed: Arc<dyn SourceFeed>,
        engine: Arc<ScoringEngine>,
        settings: CollectorSettings,
    ) -> Self {
        let influence = InfluenceCalculator::new(Arc::clone(&store), settings.activity_coefficient);
        Self {
            store,
            feed,
            engine,
            influence,
            monitors: Arc::new(Monitors::default()),
            settings,
        }
    }

    /// Wires the Analyzer and Source Feed clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError`] if either HTTP client cannot be built.
    pub fn from_config(config: &AppConfig, store: Arc<dyn Store>) -> Result<Self, CollectError> {
        let engine = ScoringEngine::from_config(config)?;
        let feed = feed_from_config(config)?;
        Ok(Self::new(
            store,
            feed,
            Arc::new(engine),
            CollectorSettings::from_config(config),
        ))
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    #[must_use]
    pub fn influence(&self) -> &InfluenceCalculator {
        &self.influence
    }

    #[must_use]
    pub fn monitors(&self) -> &Monitors {
        &self.monitors
    }

    #[must_use]
    pub fn settings(&self) -> CollectorSettings {
        self.settings
    }

    /// Stops every monitoring loop and interrupts a running KOL sweep at its
    /// next inter-KOL pause.
    pub fn shutdown(&self) {
        let running = self.monitors.running().len();
        self.monitors.shutdown();
        tracing::info!(monitors = running, "collector shut down");
    }

    fn is_shut_down(&self) -> bool {
        self.monitors.root().is_cancelled()
    }
}
