//! Database operations for `emotion_records`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use kolpulse_core::{
    EmotionPatch, EmotionRecord, EmotionVector, NewEmotionRecord, Page, RecordQuery, Window,
};

use super::map_write_error;
use crate::{batch_analyzed_at, DbError};

const RECORD_COLUMNS: &str = "id, positive_score, negative_score, neutral_score, overall_score, \
     sentiment, emotions, text, language, confidence, keywords, metadata, \
     source_id, source_type, kol_id, event_id, analyzed_at, created_at, updated_at";

/// A row from the `emotion_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EmotionRecordRow {
    pub id: Uuid,
    pub positive_score: f64,
    pub negative_score: f64,
    pub neutral_score: f64,
    pub overall_score: f64,
    pub sentiment: String,
    pub emotions: Option<Json<EmotionVector>>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub confidence: Option<f64>,
    pub keywords: Option<Vec<String>>,
    pub metadata: Option<Value>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub kol_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub analyzed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EmotionRecordRow> for EmotionRecord {
    type Error = DbError;

    fn try_from(row: EmotionRecordRow) -> Result<Self, Self::Error> {
        Ok(EmotionRecord {
            id: row.id,
            positive_score: row.positive_score,
            negative_score: row.negative_score,
            neutral_score: row.neutral_score,
            overall_score: row.overall_score,
            sentiment: row.sentiment.parse()?,
            emotions: row.emotions.map(|Json(v)| v),
            text: row.text,
            language: row.language,
            confidence: row.confidence,
            keywords: row.keywords,
            metadata: row.metadata,
            source_id: row.source_id,
            source_type: row.source_type,
            kol_id: row.kol_id,
            event_id: row.event_id,
            analyzed_at: row.analyzed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<EmotionRecordRow>) -> Result<Vec<EmotionRecord>, DbError> {
    rows.into_iter().map(EmotionRecord::try_from).collect()
}

async fn insert_record(
    conn: &mut PgConnection,
    record: &EmotionRecord,
) -> Result<EmotionRecordRow, DbError> {
    let sql = format!(
        "INSERT INTO emotion_records ({RECORD_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                 $11, $12, $13, $14, $15, $16, $17, $18, $19) \
         RETURNING {RECORD_COLUMNS}"
    );
    sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(record.id)
        .bind(record.positive_score)
        .bind(record.negative_score)
        .bind(record.neutral_score)
        .bind(record.overall_score)
        .bind(record.sentiment.as_str())
        .bind(record.emotions.map(Json))
        .bind(record.text.as_deref())
        .bind(record.language.as_deref())
        .bind(record.confidence)
        .bind(record.keywords.as_deref())
        .bind(record.metadata.as_ref())
        .bind(record.source_id.as_deref())
        .bind(record.source_type.as_deref())
        .bind(record.kol_id)
        .bind(record.event_id)
        .bind(record.analyzed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(conn)
        .await
        .map_err(map_write_error)
}

/// Validates and inserts one record.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] for out-of-range input or unknown KOL/event
/// references, or [`DbError::Sqlx`] if the insert fails.
pub(crate) async fn create_record(
    pool: &PgPool,
    input: NewEmotionRecord,
) -> Result<EmotionRecord, DbError> {
    input.validate()?;
    let record = input.into_record(Uuid::new_v4(), Utc::now());
    let mut conn = pool.acquire().await?;
    insert_record(&mut conn, &record).await?.try_into()
}

/// Inserts a batch inside one transaction.
///
/// # Errors
///
/// Returns the first validation or insert error; nothing is committed then.
pub(crate) async fn create_records(
    pool: &PgPool,
    inputs: Vec<NewEmotionRecord>,
) -> Result<Vec<EmotionRecord>, DbError> {
    for input in &inputs {
        input.validate()?;
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let mut created: Vec<EmotionRecord> = Vec::with_capacity(inputs.len());
    for (i, mut input) in inputs.into_iter().enumerate() {
        input.analyzed_at.get_or_insert(batch_analyzed_at(now, i));
        let record = input.into_record(Uuid::new_v4(), now);
        created.push(insert_record(&mut tx, &record).await?.try_into()?);
    }
    tx.commit().await?;
    Ok(created)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has this id.
pub(crate) async fn get_record(pool: &PgPool, id: Uuid) -> Result<EmotionRecord, DbError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM emotion_records WHERE id = $1");
    sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("emotion record", id))?
        .try_into()
}

/// Locks the row, merges the patch in Rust, and writes every column back.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] if the patch is invalid and
/// [`DbError::NotFound`] if no record has this id.
pub(crate) async fn update_record(
    pool: &PgPool,
    id: Uuid,
    patch: EmotionPatch,
) -> Result<EmotionRecord, DbError> {
    patch.validate()?;
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {RECORD_COLUMNS} FROM emotion_records WHERE id = $1 FOR UPDATE");
    let mut record: EmotionRecord = sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("emotion record", id))?
        .try_into()?;
    patch.apply(&mut record, Utc::now());

    let sql = format!(
        "UPDATE emotion_records SET \
             positive_score = $2, negative_score = $3, neutral_score = $4, \
             overall_score = $5, sentiment = $6, emotions = $7, text = $8, \
             language = $9, confidence = $10, keywords = $11, metadata = $12, \
             source_id = $13, source_type = $14, kol_id = $15, event_id = $16, \
             analyzed_at = $17, updated_at = $18 \
         WHERE id = $1 \
         RETURNING {RECORD_COLUMNS}"
    );
    let row = sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(record.id)
        .bind(record.positive_score)
        .bind(record.negative_score)
        .bind(record.neutral_score)
        .bind(record.overall_score)
        .bind(record.sentiment.as_str())
        .bind(record.emotions.map(Json))
        .bind(record.text.as_deref())
        .bind(record.language.as_deref())
        .bind(record.confidence)
        .bind(record.keywords.as_deref())
        .bind(record.metadata.as_ref())
        .bind(record.source_id.as_deref())
        .bind(record.source_type.as_deref())
        .bind(record.kol_id)
        .bind(record.event_id)
        .bind(record.analyzed_at)
        .bind(record.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

    tx.commit().await?;
    row.try_into()
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no record has this id.
pub(crate) async fn delete_record(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM emotion_records WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found("emotion record", id));
    }
    Ok(())
}

const WINDOW_FILTER: &str = "($1::timestamptz IS NULL OR analyzed_at >= $1) \
     AND ($2::timestamptz IS NULL OR analyzed_at <= $2) \
     AND ($3::uuid IS NULL OR event_id = $3) \
     AND ($4::uuid IS NULL OR kol_id = $4)";

/// One page of matching records, newest first, plus the total match count.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] for bad paging or [`DbError::Sqlx`] if a
/// query fails.
pub(crate) async fn query_records(
    pool: &PgPool,
    query: &RecordQuery,
) -> Result<Page<EmotionRecord>, DbError> {
    query.validate()?;
    let window = query.window;
    let sentiment = query.sentiment.map(|s| s.as_str());

    let count_sql = format!(
        "SELECT COUNT(*) FROM emotion_records \
         WHERE {WINDOW_FILTER} AND ($5::text IS NULL OR sentiment = $5)"
    );
    let total = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(window.start_date)
        .bind(window.end_date)
        .bind(window.event_id)
        .bind(window.kol_id)
        .bind(sentiment)
        .fetch_one(pool)
        .await?;

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM emotion_records \
         WHERE {WINDOW_FILTER} AND ($5::text IS NULL OR sentiment = $5) \
         ORDER BY analyzed_at DESC, id \
         LIMIT $6 OFFSET $7"
    );
    let rows = sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(window.start_date)
        .bind(window.end_date)
        .bind(window.event_id)
        .bind(window.kol_id)
        .bind(sentiment)
        .bind(i64::from(query.limit))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;

    Ok(Page {
        items: into_records(rows)?,
        total,
    })
}

/// Every record inside the window, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub(crate) async fn scan_records(
    pool: &PgPool,
    window: &Window,
) -> Result<Vec<EmotionRecord>, DbError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM emotion_records \
         WHERE {WINDOW_FILTER} \
         ORDER BY analyzed_at ASC, id DESC"
    );
    let rows = sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(window.start_date)
        .bind(window.end_date)
        .bind(window.event_id)
        .bind(window.kol_id)
        .fetch_all(pool)
        .await?;
    into_records(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub(crate) async fn recent_by_source(
    pool: &PgPool,
    source_id: &str,
    limit: usize,
) -> Result<Vec<EmotionRecord>, DbError> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM emotion_records \
         WHERE source_id = $1 \
         ORDER BY analyzed_at DESC, id \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, EmotionRecordRow>(&sql)
        .bind(source_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(pool)
        .await?;
    into_records(rows)
}
