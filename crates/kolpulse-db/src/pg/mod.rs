//! Postgres-backed [`Store`].
//!
//! Each table's queries live in their own module as free functions taking a
//! `&PgPool`; [`PgStore`] only forwards to them.

mod events;
mod kols;
mod records;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use kolpulse_core::{
    EmotionPatch, EmotionRecord, Event, EventMetrics, EventOverview, EventPatch, EventQuery,
    EventStatus, Kol, KolPatch, NewEmotionRecord, NewEvent, NewKol, Page, RecordQuery,
    ValidationError, Window,
};

use crate::{DbError, Store};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

/// Turns a dangling `kol_id`/`event_id` reference into a validation error
/// naming the column; everything else passes through.
pub(crate) fn map_write_error(e: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            let field = match db.constraint() {
                Some(c) if c.contains("kol_id") => "kol_id",
                Some(c) if c.contains("event_id") => "event_id",
                _ => "reference",
            };
            return ValidationError::new(field, "references a row that does not exist").into();
        }
    }
    DbError::from(e)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_record(&self, input: NewEmotionRecord) -> Result<EmotionRecord, DbError> {
        records::create_record(&self.pool, input).await
    }

    async fn create_records(
        &self,
        inputs: Vec<NewEmotionRecord>,
    ) -> Result<Vec<EmotionRecord>, DbError> {
        records::create_records(&self.pool, inputs).await
    }

    async fn get_record(&self, id: Uuid) -> Result<EmotionRecord, DbError> {
        records::get_record(&self.pool, id).await
    }

    async fn update_record(
        &self,
        id: Uuid,
        patch: EmotionPatch,
    ) -> Result<EmotionRecord, DbError> {
        records::update_record(&self.pool, id, patch).await
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError> {
        records::delete_record(&self.pool, id).await
    }

    async fn query_records(&self, query: &RecordQuery) -> Result<Page<EmotionRecord>, DbError> {
        records::query_records(&self.pool, query).await
    }

    async fn scan_records(&self, window: &Window) -> Result<Vec<EmotionRecord>, DbError> {
        records::scan_records(&self.pool, window).await
    }

    async fn recent_by_source(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<EmotionRecord>, DbError> {
        records::recent_by_source(&self.pool, source_id, limit).await
    }

    async fn create_kol(&self, input: NewKol) -> Result<Kol, DbError> {
        kols::create_kol(&self.pool, input).await
    }

    async fn get_kol(&self, id: Uuid) -> Result<Kol, DbError> {
        kols::get_kol(&self.pool, id).await
    }

    async fn find_kol_by_username(&self, username: &str) -> Result<Kol, DbError> {
        kols::find_kol_by_username(&self.pool, username).await
    }

    async fn list_kols(&self, is_active: Option<bool>) -> Result<Vec<Kol>, DbError> {
        kols::list_kols(&self.pool, is_active, None).await
    }

    async fn active_kols(&self, limit: usize) -> Result<Vec<Kol>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        kols::list_kols(&self.pool, Some(true), Some(limit)).await
    }

    async fn update_kol(&self, id: Uuid, patch: KolPatch) -> Result<Kol, DbError> {
        kols::update_kol(&self.pool, id, patch).await
    }

    async fn deactivate_kol(&self, id: Uuid) -> Result<Kol, DbError> {
        kols::deactivate_kol(&self.pool, id).await
    }

    async fn set_kol_scores(
        &self,
        username: &str,
        emotion_score: f64,
        influence_score: f64,
    ) -> Result<Kol, DbError> {
        kols::set_kol_scores(&self.pool, username, emotion_score, influence_score).await
    }

    async fn create_event(&self, input: NewEvent, status: EventStatus) -> Result<Event, DbError> {
        events::create_event(&self.pool, input, status).await
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, DbError> {
        events::get_event(&self.pool, id).await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Page<Event>, DbError> {
        events::list_events(&self.pool, query).await
    }

    async fn events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, DbError> {
        events::events_by_status(&self.pool, status).await
    }

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> Result<Event, DbError> {
        events::update_event(&self.pool, id, patch).await
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), DbError> {
        events::delete_event(&self.pool, id).await
    }

    async fn transition_event(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Event, DbError> {
        events::transition_event(&self.pool, id, from, to).await
    }

    async fn set_event_metrics(&self, id: Uuid, metrics: EventMetrics) -> Result<Event, DbError> {
        events::set_event_metrics(&self.pool, id, metrics).await
    }

    async fn event_kols(&self, id: Uuid) -> Result<Vec<Kol>, DbError> {
        events::event_kols(&self.pool, id).await
    }

    async fn event_overview(&self) -> Result<EventOverview, DbError> {
        events::event_overview(&self.pool).await
    }

    async fn health_check(&self) -> Result<(), DbError> {
        crate::ping(&self.pool).await?;
        Ok(())
    }
}
