use async_trait::async_trait;
use uuid::Uuid;

use kolpulse_core::{
    EmotionPatch, EmotionRecord, Event, EventMetrics, EventOverview, EventPatch, EventQuery,
    EventStatus, Kol, KolPatch, NewEmotionRecord, NewEvent, NewKol, Page, RecordQuery, Window,
};

use crate::DbError;

/// Durable storage for records, KOLs, and events.
///
/// Every write is durable before the call returns. Invalid input fails with
/// [`DbError::Invalid`] and writes nothing.
#[async_trait]
pub trait Store: Send + Sync {
    // -- emotion records ----------------------------------------------------

    async fn create_record(&self, input: NewEmotionRecord) -> Result<EmotionRecord, DbError>;

    /// Persists a batch atomically: either every record is written or none.
    async fn create_records(
        &self,
        inputs: Vec<NewEmotionRecord>,
    ) -> Result<Vec<EmotionRecord>, DbError>;

    async fn get_record(&self, id: Uuid) -> Result<EmotionRecord, DbError>;

    async fn update_record(&self, id: Uuid, patch: EmotionPatch)
        -> Result<EmotionRecord, DbError>;

    async fn delete_record(&self, id: Uuid) -> Result<(), DbError>;

    /// One page of matching records, newest `analyzed_at` first.
    async fn query_records(&self, query: &RecordQuery) -> Result<Page<EmotionRecord>, DbError>;

    /// Every record inside `window`, oldest `analyzed_at` first.
    async fn scan_records(&self, window: &Window) -> Result<Vec<EmotionRecord>, DbError>;

    /// The newest `limit` records for `source_id`, newest first.
    async fn recent_by_source(
        &self,
        source_id: &str,
        limit: usize,
    ) -> Result<Vec<EmotionRecord>, DbError>;

    // -- KOLs ---------------------------------------------------------------

    /// Creates a KOL. Username uniqueness and the active cap are checked at a
    /// single serialization point, so concurrent creates cannot race past
    /// either.
    async fn create_kol(&self, input: NewKol) -> Result<Kol, DbError>;

    async fn get_kol(&self, id: Uuid) -> Result<Kol, DbError>;

    async fn find_kol_by_username(&self, username: &str) -> Result<Kol, DbError>;

    /// All KOLs, optionally filtered by `is_active`, highest `emotion_score` first.
    async fn list_kols(&self, is_active: Option<bool>) -> Result<Vec<Kol>, DbError>;

    /// Active KOLs, highest `emotion_score` first, at most `limit`.
    async fn active_kols(&self, limit: usize) -> Result<Vec<Kol>, DbError>;

    /// Reactivating a KOL goes through the same cap check as creation.
    async fn update_kol(&self, id: Uuid, patch: KolPatch) -> Result<Kol, DbError>;

    /// Soft delete: sets `is_active = false`.
    async fn deactivate_kol(&self, id: Uuid) -> Result<Kol, DbError>;

    async fn set_kol_scores(
        &self,
        username: &str,
        emotion_score: f64,
        influence_score: f64,
    ) -> Result<Kol, DbError>;

    // -- events -------------------------------------------------------------

    /// Creates an event with `status` and associates the listed KOLs that
    /// exist; unknown KOL ids are skipped.
    async fn create_event(&self, input: NewEvent, status: EventStatus) -> Result<Event, DbError>;

    async fn get_event(&self, id: Uuid) -> Result<Event, DbError>;

    /// Filtered page of events, latest `start_date` first.
    async fn list_events(&self, query: &EventQuery) -> Result<Page<Event>, DbError>;

    async fn events_by_status(&self, status: EventStatus) -> Result<Vec<Event>, DbError>;

    async fn update_event(&self, id: Uuid, patch: EventPatch) -> Result<Event, DbError>;

    /// Hard delete. Records keep their data and lose the event association.
    async fn delete_event(&self, id: Uuid) -> Result<(), DbError>;

    /// Moves an event from `from` to `to` only if it is still in `from`.
    ///
    /// Fails with [`DbError::InvalidTransition`] if the event has moved on or
    /// the transition is not part of the state machine.
    async fn transition_event(
        &self,
        id: Uuid,
        from: EventStatus,
        to: EventStatus,
    ) -> Result<Event, DbError>;

    async fn set_event_metrics(&self, id: Uuid, metrics: EventMetrics) -> Result<Event, DbError>;

    /// The KOLs associated with an event.
    async fn event_kols(&self, id: Uuid) -> Result<Vec<Kol>, DbError>;

    async fn event_overview(&self) -> Result<EventOverview, DbError>;

    // -- health -------------------------------------------------------------

    async fn health_check(&self) -> Result<(), DbError>;
}
