//! Database operations for `events` and `event_kols`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use kolpulse_core::{
    AlertLevel, Event, EventMetrics, EventOverview, EventPatch, EventQuery, EventStatus, Kol,
    NewEvent, Page,
};

use super::kols::{KolRow, KOL_COLUMNS};
use crate::DbError;

const EVENT_COLUMNS: &str = "id, name, description, type AS event_type, source, data, status, \
     start_date, end_date, emotion_score, emotion_trend, alert_level, total_posts, \
     keywords, hashtags, user_id, created_at, updated_at";

/// A row from the `events` table. KOL associations live in `event_kols`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub event_type: String,
    pub source: Option<String>,
    pub data: Option<Value>,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub emotion_score: f64,
    pub emotion_trend: String,
    pub alert_level: String,
    pub total_posts: i64,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, kol_ids: Vec<Uuid>) -> Result<Event, DbError> {
        Ok(Event {
            id: self.id,
            name: self.name,
            description: self.description,
            event_type: self.event_type.parse()?,
            source: self.source,
            data: self.data,
            status: self.status.parse()?,
            start_date: self.start_date,
            end_date: self.end_date,
            emotion_score: self.emotion_score,
            emotion_trend: self.emotion_trend.parse()?,
            alert_level: self.alert_level.parse()?,
            total_posts: self.total_posts,
            keywords: self.keywords,
            hashtags: self.hashtags,
            user_id: self.user_id,
            kol_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn load_kol_ids(conn: &mut PgConnection, event_id: Uuid) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT kol_id FROM event_kols WHERE event_id = $1 ORDER BY created_at, kol_id",
    )
    .bind(event_id)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}

/// Attaches KOL ids to a batch of rows with a single lookup.
async fn hydrate(pool: &PgPool, rows: Vec<EventRow>) -> Result<Vec<Event>, DbError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let pairs = sqlx::query_as::<_, (Uuid, Uuid)>(
        "SELECT event_id, kol_id FROM event_kols \
         WHERE event_id = ANY($1::uuid[]) \
         ORDER BY created_at, kol_id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_event: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (event_id, kol_id) in pairs {
        by_event.entry(event_id).or_default().push(kol_id);
    }
    rows.into_iter()
        .map(|row| {
            let kol_ids = by_event.remove(&row.id).unwrap_or_default();
            row.into_event(kol_ids)
        })
        .collect()
}

async fn fetch_event(conn: &mut PgConnection, id: Uuid, lock: bool) -> Result<Event, DbError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("event", id))?;
    let kol_ids = load_kol_ids(conn, id).await?;
    row.into_event(kol_ids)
}

/// Inserts the event and its KOL associations in one transaction. KOL ids
/// that do not exist are skipped.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] for bad input or [`DbError::Sqlx`] on failure.
pub(crate) async fn create_event(
    pool: &PgPool,
    input: NewEvent,
    status: EventStatus,
) -> Result<Event, DbError> {
    input.validate()?;
    let requested = input.kol_ids.clone();
    let event = input.into_event(Uuid::new_v4(), status, Utc::now());

    let mut tx = pool.begin().await?;
    let sql = format!(
        "INSERT INTO events (id, name, description, type, source, data, status, \
             start_date, end_date, emotion_score, emotion_trend, alert_level, total_posts, \
             keywords, hashtags, user_id, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                 $14, $15, $16, $17, $18) \
         RETURNING {EVENT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(event.id)
        .bind(&event.name)
        .bind(event.description.as_deref())
        .bind(event.event_type.as_str())
        .bind(event.source.as_deref())
        .bind(event.data.as_ref())
        .bind(event.status.as_str())
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.emotion_score)
        .bind(event.emotion_trend.as_str())
        .bind(event.alert_level.as_str())
        .bind(event.total_posts)
        .bind(&event.keywords)
        .bind(&event.hashtags)
        .bind(event.user_id)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO event_kols (event_id, kol_id) \
         SELECT $1, id FROM kols WHERE id = ANY($2::uuid[]) \
         ON CONFLICT DO NOTHING",
    )
    .bind(event.id)
    .bind(&requested)
    .execute(&mut *tx)
    .await?;
    let kol_ids = load_kol_ids(&mut tx, event.id).await?;

    tx.commit().await?;
    row.into_event(kol_ids)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no event has this id.
pub(crate) async fn get_event(pool: &PgPool, id: Uuid) -> Result<Event, DbError> {
    let mut conn = pool.acquire().await?;
    fetch_event(&mut conn, id, false).await
}

const EVENT_FILTER: &str = "($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%') \
     AND ($2::TEXT IS NULL OR type = $2) \
     AND ($3::TEXT IS NULL OR status = $3)";

/// # Errors
///
/// Returns [`DbError::Invalid`] for bad paging or [`DbError::Sqlx`] on failure.
pub(crate) async fn list_events(pool: &PgPool, query: &EventQuery) -> Result<Page<Event>, DbError> {
    query.validate()?;
    let search = query.search.as_deref();
    let event_type = query.event_type.map(|t| t.as_str());
    let status = query.status.map(|s| s.as_str());

    let count_sql = format!("SELECT COUNT(*) FROM events WHERE {EVENT_FILTER}");
    let total = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(search)
        .bind(event_type)
        .bind(status)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE {EVENT_FILTER} \
         ORDER BY start_date DESC, id \
         LIMIT $4 OFFSET $5"
    );
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(search)
        .bind(event_type)
        .bind(status)
        .bind(i64::from(query.limit))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items: hydrate(pool, rows).await?,
        total,
    })
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub(crate) async fn events_by_status(
    pool: &PgPool,
    status: EventStatus,
) -> Result<Vec<Event>, DbError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE status = $1 ORDER BY created_at DESC, id"
    );
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
    hydrate(pool, rows).await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] or [`DbError::Invalid`].
pub(crate) async fn update_event(
    pool: &PgPool,
    id: Uuid,
    patch: EventPatch,
) -> Result<Event, DbError> {
    let mut tx = pool.begin().await?;
    let mut event = fetch_event(&mut tx, id, true).await?;
    patch.validate(&event)?;
    patch.apply(&mut event, Utc::now());

    sqlx::query(
        "UPDATE events SET \
             name = $2, description = $3, type = $4, source = $5, data = $6, \
             start_date = $7, end_date = $8, keywords = $9, hashtags = $10, updated_at = $11 \
         WHERE id = $1",
    )
    .bind(event.id)
    .bind(&event.name)
    .bind(event.description.as_deref())
    .bind(event.event_type.as_str())
    .bind(event.source.as_deref())
    .bind(event.data.as_ref())
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.keywords)
    .bind(&event.hashtags)
    .bind(event.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(event)
}

/// Deletes the event. `event_kols` rows cascade and records have their
/// `event_id` cleared by the foreign key.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no event has this id.
pub(crate) async fn delete_event(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("event", id));
    }
    Ok(())
}

/// Conditional status update: only succeeds while the event is in `from`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTransition`] if the event is no longer in `from`
/// or the edge is not allowed, [`DbError::NotFound`] if it does not exist.
pub(crate) async fn transition_event(
    pool: &PgPool,
    id: Uuid,
    from: EventStatus,
    to: EventStatus,
) -> Result<Event, DbError> {
    let invalid = || DbError::InvalidTransition {
        id: id.to_string(),
        expected_status: from.as_str(),
    };
    if !from.can_transition_to(to) {
        return Err(invalid());
    }

    let mut conn = pool.acquire().await?;
    let result = sqlx::query(
        "UPDATE events SET status = $3, updated_at = NOW() \
         WHERE id = $1 AND status = $2",
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        // Distinguish a missing event from one that already moved on.
        fetch_event(&mut conn, id, false).await?;
        return Err(invalid());
    }
    fetch_event(&mut conn, id, false).await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no event has this id.
pub(crate) async fn set_event_metrics(
    pool: &PgPool,
    id: Uuid,
    metrics: EventMetrics,
) -> Result<Event, DbError> {
    let mut conn = pool.acquire().await?;
    let result = sqlx::query(
        "UPDATE events SET emotion_score = $2, emotion_trend = $3, alert_level = $4, \
             total_posts = $5, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(metrics.emotion_score)
    .bind(metrics.emotion_trend.as_str())
    .bind(metrics.alert_level.as_str())
    .bind(metrics.total_posts)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("event", id));
    }
    fetch_event(&mut conn, id, false).await
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no event has this id.
pub(crate) async fn event_kols(pool: &PgPool, id: Uuid) -> Result<Vec<Kol>, DbError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(DbError::not_found("event", id));
    }

    let sql = format!(
        "SELECT {KOL_COLUMNS} FROM kols \
         WHERE id IN (SELECT kol_id FROM event_kols WHERE event_id = $1) \
         ORDER BY username"
    );
    let rows = sqlx::query_as::<_, KolRow>(&sql)
        .bind(id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Kol::from).collect())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub(crate) async fn event_overview(pool: &PgPool) -> Result<EventOverview, DbError> {
    let (total, active, high_alerts, total_posts) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        "SELECT COUNT(*), \
                COUNT(*) FILTER (WHERE status = $1), \
                COUNT(*) FILTER (WHERE alert_level = $2), \
                COALESCE(SUM(total_posts), 0)::BIGINT \
         FROM events",
    )
    .bind(EventStatus::Active.as_str())
    .bind(AlertLevel::High.as_str())
    .fetch_one(pool)
    .await?;

    let by_status = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM events GROUP BY status",
    )
    .fetch_all(pool)
    .await?;
    let by_type = sqlx::query_as::<_, (String, i64)>(
        "SELECT type, COUNT(*) FROM events GROUP BY type",
    )
    .fetch_all(pool)
    .await?;

    Ok(EventOverview {
        total,
        active,
        high_alerts,
        total_posts,
        by_status: by_status.into_iter().collect(),
        by_type: by_type.into_iter().collect(),
    })
}
