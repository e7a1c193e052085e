//! Database operations for `kols`.
//!
//! Every write that can change uniqueness or the active count runs in a
//! transaction holding a transaction-scoped advisory lock, which serializes
//! concurrent creators across connections.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use kolpulse_core::{Kol, KolPatch, NewKol, MAX_ACTIVE_KOLS};

use super::is_unique_violation;
use crate::DbError;

/// Advisory lock key guarding KOL creation and reactivation.
const KOL_WRITE_LOCK: i64 = 0x6b6f_6c70_756c_7365;

pub(crate) const KOL_COLUMNS: &str = "id, username, twitter_id, followers_count, category, avatar, \
     is_active, emotion_score, influence_score, metadata, created_at, updated_at";

/// A row from the `kols` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct KolRow {
    pub id: Uuid,
    pub username: String,
    pub twitter_id: Option<String>,
    pub followers_count: i64,
    pub category: Option<String>,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub emotion_score: f64,
    pub influence_score: f64,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<KolRow> for Kol {
    fn from(row: KolRow) -> Self {
        Kol {
            id: row.id,
            username: row.username,
            twitter_id: row.twitter_id,
            followers_count: row.followers_count,
            category: row.category,
            avatar: row.avatar,
            is_active: row.is_active,
            emotion_score: row.emotion_score,
            influence_score: row.influence_score,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

async fn lock_kol_writes(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(KOL_WRITE_LOCK)
        .execute(conn)
        .await?;
    Ok(())
}

async fn ensure_capacity(conn: &mut PgConnection) -> Result<(), DbError> {
    let active = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kols WHERE is_active")
        .fetch_one(conn)
        .await?;
    if usize::try_from(active).unwrap_or(usize::MAX) >= MAX_ACTIVE_KOLS {
        return Err(DbError::Capacity {
            entity: "kol",
            limit: MAX_ACTIVE_KOLS,
        });
    }
    Ok(())
}

/// Creates a KOL after checking username uniqueness and the active cap
/// under the KOL write lock.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] for a taken username,
/// [`DbError::Capacity`] when the active cap is reached, or
/// [`DbError::Invalid`] for bad input.
pub(crate) async fn create_kol(pool: &PgPool, input: NewKol) -> Result<Kol, DbError> {
    input.validate()?;
    let mut tx = pool.begin().await?;
    lock_kol_writes(&mut tx).await?;

    let taken =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM kols WHERE username = $1)")
            .bind(&input.username)
            .fetch_one(&mut *tx)
            .await?;
    if taken {
        return Err(DbError::Conflict {
            entity: "kol",
            field: "username",
            value: input.username,
        });
    }
    if input.is_active {
        ensure_capacity(&mut tx).await?;
    }

    let kol = input.into_kol(Uuid::new_v4(), Utc::now());
    let sql = format!(
        "INSERT INTO kols ({KOL_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING {KOL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(kol.id)
        .bind(&kol.username)
        .bind(kol.twitter_id.as_deref())
        .bind(kol.followers_count)
        .bind(kol.category.as_deref())
        .bind(kol.avatar.as_deref())
        .bind(kol.is_active)
        .bind(kol.emotion_score)
        .bind(kol.influence_score)
        .bind(kol.metadata.as_ref())
        .bind(kol.created_at)
        .bind(kol.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict {
                    entity: "kol",
                    field: "username",
                    value: kol.username.clone(),
                }
            } else {
                DbError::from(e)
            }
        })?;

    tx.commit().await?;
    Ok(row.into())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no KOL has this id.
pub(crate) async fn get_kol(pool: &PgPool, id: Uuid) -> Result<Kol, DbError> {
    let sql = format!("SELECT {KOL_COLUMNS} FROM kols WHERE id = $1");
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("kol", id))?;
    Ok(row.into())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no KOL has this username.
pub(crate) async fn find_kol_by_username(pool: &PgPool, username: &str) -> Result<Kol, DbError> {
    let sql = format!("SELECT {KOL_COLUMNS} FROM kols WHERE username = $1");
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("kol", username))?;
    Ok(row.into())
}

/// KOLs ordered by `emotion_score` descending, optionally filtered by
/// `is_active` and capped at `limit`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub(crate) async fn list_kols(
    pool: &PgPool,
    is_active: Option<bool>,
    limit: Option<i64>,
) -> Result<Vec<Kol>, DbError> {
    let sql = format!(
        "SELECT {KOL_COLUMNS} FROM kols \
         WHERE ($1::BOOLEAN IS NULL OR is_active = $1) \
         ORDER BY emotion_score DESC, username \
         LIMIT COALESCE($2, 9223372036854775807)"
    );
    let rows = sqlx::query_as::<_, KolRow>(&sql)
        .bind(is_active)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Kol::from).collect())
}

/// Applies a patch under the KOL write lock, re-checking the cap when the
/// patch reactivates the KOL.
///
/// # Errors
///
/// Returns [`DbError::NotFound`], [`DbError::Capacity`], or
/// [`DbError::Invalid`].
pub(crate) async fn update_kol(pool: &PgPool, id: Uuid, patch: KolPatch) -> Result<Kol, DbError> {
    patch.validate()?;
    let mut tx = pool.begin().await?;
    lock_kol_writes(&mut tx).await?;

    let sql = format!("SELECT {KOL_COLUMNS} FROM kols WHERE id = $1 FOR UPDATE");
    let mut kol: Kol = sqlx::query_as::<_, KolRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("kol", id))?
        .into();
    if patch.reactivates(&kol) {
        ensure_capacity(&mut tx).await?;
    }
    patch.apply(&mut kol, Utc::now());

    let sql = format!(
        "UPDATE kols SET \
             twitter_id = $2, followers_count = $3, category = $4, avatar = $5, \
             is_active = $6, metadata = $7, updated_at = $8 \
         WHERE id = $1 \
         RETURNING {KOL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(kol.id)
        .bind(kol.twitter_id.as_deref())
        .bind(kol.followers_count)
        .bind(kol.category.as_deref())
        .bind(kol.avatar.as_deref())
        .bind(kol.is_active)
        .bind(kol.metadata.as_ref())
        .bind(kol.updated_at)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row.into())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no KOL has this id.
pub(crate) async fn deactivate_kol(pool: &PgPool, id: Uuid) -> Result<Kol, DbError> {
    let sql = format!(
        "UPDATE kols SET is_active = FALSE, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {KOL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("kol", id))?;
    Ok(row.into())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no KOL has this username.
pub(crate) async fn set_kol_scores(
    pool: &PgPool,
    username: &str,
    emotion_score: f64,
    influence_score: f64,
) -> Result<Kol, DbError> {
    let sql = format!(
        "UPDATE kols SET emotion_score = $2, influence_score = $3, updated_at = NOW() \
         WHERE username = $1 \
         RETURNING {KOL_COLUMNS}"
    );
    let row = sqlx::query_as::<_, KolRow>(&sql)
        .bind(username)
        .bind(emotion_score)
        .bind(influence_score)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::not_found("kol", username))?;
    Ok(row.into())
}
