//! Tracked influencers ("KOLs").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{check_object, ValidationError};

/// Hard cap on simultaneously active KOLs.
pub const MAX_ACTIVE_KOLS: usize = 50;

/// A tracked influencer.
///
/// `emotion_score` (0–5 grade scale) and `influence_score` are derived and
/// only written by the influence calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kol {
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKol {
    pub username: String,
    #[serde(default)]
    pub twitter_id: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewKol {
    #[must_use]
    pub fn new(username: impl Into<String>, followers_count: i64) -> Self {
        Self {
            username: username.into(),
            twitter_id: None,
            followers_count,
            category: None,
            avatar: None,
            is_active: true,
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty or whitespace-containing
    /// username, or a negative follower count.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_followers(self.followers_count)
    }

    /// Builds the stored KOL. Call [`Self::validate`] first.
    #[must_use]
    pub fn into_kol(self, id: Uuid, now: DateTime<Utc>) -> Kol {
        Kol {
            id,
            username: self.username,
            twitter_id: self.twitter_id,
            followers_count: self.followers_count,
            category: self.category,
            avatar: self.avatar,
            is_active: self.is_active,
            emotion_score: 0.0,
            influence_score: 0.0,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Explicit partial update for a [`Kol`].
///
/// The username is immutable and the derived scores are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KolPatch {
    pub twitter_id: Option<String>,
    pub followers_count: Option<i64>,
    pub category: Option<String>,
    pub avatar: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<Value>,
}

impl KolPatch {
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(followers) = self.followers_count {
            validate_followers(followers)?;
        }
        if let Some(metadata) = &self.metadata {
            check_object("metadata", metadata)?;
        }
        Ok(())
    }

    /// Whether applying this patch would move `kol` from inactive to active.
    #[must_use]
    pub fn reactivates(&self, kol: &Kol) -> bool {
        !kol.is_active && self.is_active == Some(true)
    }

    pub fn apply(self, kol: &mut Kol, now: DateTime<Utc>) {
        if let Some(v) = self.twitter_id {
            kol.twitter_id = Some(v);
        }
        if let Some(v) = self.followers_count {
            kol.followers_count = v;
        }
        if let Some(v) = self.category {
            kol.category = Some(v);
        }
        if let Some(v) = self.avatar {
            kol.avatar = Some(v);
        }
        if let Some(v) = self.is_active {
            kol.is_active = v;
        }
        if let Some(v) = self.metadata {
            kol.metadata = Some(v);
        }
        kol.updated_at = now;
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::new("username", "must not be empty"));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ValidationError::new(
            "username",
            "must not contain whitespace",
        ));
    }
    Ok(())
}

fn validate_followers(followers: i64) -> Result<(), ValidationError> {
    if followers < 0 {
        return Err(ValidationError::new(
            "followers_count",
            format!("must be non-negative, got {followers}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_kol_defaults_to_active_when_deserialized() {
        let kol: NewKol = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert!(kol.is_active);
        assert_eq!(kol.followers_count, 0);
    }

    #[test]
    fn validate_rejects_empty_username() {
        let err = NewKol::new("", 10).validate().unwrap_err();
        assert_eq!(err.field, "username");
    }

    #[test]
    fn validate_rejects_whitespace_username() {
        let err = NewKol::new("al ice", 10).validate().unwrap_err();
        assert_eq!(err.field, "username");
    }

    #[test]
    fn validate_rejects_negative_followers() {
        let err = NewKol::new("alice", -1).validate().unwrap_err();
        assert_eq!(err.field, "followers_count");
    }

    #[test]
    fn into_kol_starts_with_zero_scores() {
        let kol = NewKol::new("alice", 1_000).into_kol(Uuid::new_v4(), Utc::now());
        assert_eq!(kol.emotion_score, 0.0);
        assert_eq!(kol.influence_score, 0.0);
        assert!(kol.is_active);
    }

    #[test]
    fn patch_reactivation_is_detected() {
        let mut kol = NewKol::new("alice", 1_000).into_kol(Uuid::new_v4(), Utc::now());
        kol.is_active = false;
        let patch = KolPatch {
            is_active: Some(true),
            ..KolPatch::default()
        };
        assert!(patch.reactivates(&kol));
        kol.is_active = true;
        assert!(!patch.reactivates(&kol));
    }

    #[test]
    fn patch_apply_keeps_scores() {
        let mut kol = NewKol::new("alice", 1_000).into_kol(Uuid::new_v4(), Utc::now());
        kol.emotion_score = 3.5;
        KolPatch {
            followers_count: Some(2_000),
            category: Some("tech".to_string()),
            ..KolPatch::default()
        }
        .apply(&mut kol, Utc::now());
        assert_eq!(kol.followers_count, 2_000);
        assert_eq!(kol.category.as_deref(), Some("tech"));
        assert_eq!(kol.emotion_score, 3.5);
    }
}
