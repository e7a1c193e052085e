//! Rolling per-KOL emotion and influence scores.
//!
//! The emotion score is a 0–5 grade averaged over the KOL's most recent
//! records. Influence combines reach (followers) with that grade and an
//! activity coefficient. The coefficient is an approximation: it is a
//! configured constant (default 1) until a posting-frequency signal exists.

use std::sync::Arc;

use kolpulse_core::{EmotionRecord, Kol, Sentiment};
use kolpulse_db::{DbError, Store};

/// How many of a KOL's newest records feed the grade average.
pub const RECENT_WINDOW: usize = 100;

const NEUTRAL_GRADE: f64 = 3.0;
const MAX_GRADE: f64 = 5.0;

/// Sentiment to 0–5 grade: positive 4, negative 2, anything else 3.
#[must_use]
pub const fn grade(sentiment: Sentiment) -> f64 {
    match sentiment {
        Sentiment::Positive => 4.0,
        Sentiment::Negative => 2.0,
        Sentiment::Neutral | Sentiment::Mixed => NEUTRAL_GRADE,
    }
}

/// Mean grade over `records`; a KOL with no records grades neutral.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_grade(records: &[EmotionRecord]) -> f64 {
    if records.is_empty() {
        return NEUTRAL_GRADE;
    }
    records.iter().map(|r| grade(r.sentiment)).sum::<f64>() / records.len() as f64
}

/// `log10(followers) × 2 × coefficient × (score / 5)`. Follower counts
/// below 1 are treated as 1, giving 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn influence_score(followers_count: i64, emotion_score: f64, activity_coefficient: f64) -> f64 {
    let reach = (followers_count.max(1) as f64).log10();
    reach * 2.0 * activity_coefficient * (emotion_score / MAX_GRADE)
}

/// Writes emotion and influence scores back to the store.
#[derive(Clone)]
pub struct InfluenceCalculator {
    store: Arc<dyn Store>,
    activity_coefficient: f64,
}

impl InfluenceCalculator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, activity_coefficient: f64) -> Self {
        Self {
            store,
            activity_coefficient,
        }
    }

    #[must_use]
    pub fn activity_coefficient(&self) -> f64 {
        self.activity_coefficient
    }

    /// Sets the KOL's emotion score to `new_score` and recomputes its
    /// influence from the current follower count.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no KOL has `username`.
    pub async fn update_emotion_score(&self, username: &str, new_score: f64) -> Result<Kol, DbError> {
        let kol = self.store.find_kol_by_username(username).await?;
        let influence = influence_score(kol.followers_count, new_score, self.activity_coefficient);
        let updated = self
            .store
            .set_kol_scores(username, new_score, influence)
            .await?;
        tracing::debug!(
            kol = %username,
            emotion_score = new_score,
            influence_score = influence,
            "updated kol scores"
        );
        Ok(updated)
    }

    /// Grades the KOL's newest [`RECENT_WINDOW`] records and writes the
    /// result through [`Self::update_emotion_score`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on store failure or an unknown username.
    pub async fn recompute(&self, username: &str) -> Result<Kol, DbError> {
        let recent = self.store.recent_by_source(username, RECENT_WINDOW).await?;
        let score = average_grade(&recent);
        self.update_emotion_score(username, score).await
    }
}
