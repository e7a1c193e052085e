use std::sync::Arc;

use kolpulse_core::{Granularity, Window};
use kolpulse_db::{DbError, Store};
use uuid::Uuid;

use crate::views::{
    self, EmotionStats, EventComparisonRow, Heatmap, KolInfluenceRow, TrendBucket,
};

/// Store-backed entry point for the derived views.
///
/// Each call scans the records inside the window once and computes the view
/// in memory; nothing is cached between calls.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the scan fails.
    pub async fn stats(&self, window: &Window) -> Result<EmotionStats, DbError> {
        let records = self.store.scan_records(window).await?;
        Ok(views::stats(&records))
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the scan fails.
    pub async fn trends(
        &self,
        window: &Window,
        granularity: Granularity,
    ) -> Result<Vec<TrendBucket>, DbError> {
        let records = self.store.scan_records(window).await?;
        Ok(views::trends(&records, granularity))
    }

    /// # Errors
    ///
    /// Returns [`DbError`] if the scan fails.
    pub async fn heatmap(&self, window: &Window) -> Result<Heatmap, DbError> {
        let records = self.store.scan_records(window).await?;
        Ok(views::heatmap(&records))
    }

    /// Ranking rows with usernames filled in. A KOL that cannot be loaded
    /// keeps `username: None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the scan fails.
    pub async fn kol_influence(
        &self,
        window: &Window,
        limit: Option<usize>,
    ) -> Result<Vec<KolInfluenceRow>, DbError> {
        let records = self.store.scan_records(window).await?;
        let mut rows = views::kol_influence(&records, limit);
        for row in &mut rows {
            match self.store.get_kol(row.kol_id).await {
                Ok(kol) => row.username = Some(kol.username),
                Err(e) => tracing::debug!(kol_id = %row.kol_id, error = %e, "ranking row without kol"),
            }
        }
        Ok(rows)
    }

    /// Comparison rows with event names filled in. Deleted events have no
    /// records left to compare, so a missing event keeps `event_name: None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the scan fails.
    pub async fn event_comparison(
        &self,
        window: &Window,
        event_ids: &[Uuid],
    ) -> Result<Vec<EventComparisonRow>, DbError> {
        let records = self.store.scan_records(window).await?;
        let mut rows = views::event_comparison(&records, event_ids);
        for row in &mut rows {
            match self.store.get_event(row.event_id).await {
                Ok(event) => row.event_name = Some(event.name),
                Err(e) => {
                    tracing::debug!(event_id = %row.event_id, error = %e, "comparison row without event");
                }
            }
        }
        Ok(rows)
    }
}
