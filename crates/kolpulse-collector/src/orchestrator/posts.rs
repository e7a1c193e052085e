use kolpulse_core::{EmotionRecord, NewEmotionRecord, ValidationError};
use kolpulse_db::DbError;
use kolpulse_scoring::{ScoredPost, ScoringEngine};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::Orchestrator;
use crate::error::CollectError;
use crate::feed::FeedPost;

pub(crate) const KOL_SOURCE: &str = "kol";
pub(crate) const EVENT_SOURCE: &str = "event";

/// Where a fetched post came from.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Origin<'a> {
    Kol { username: &'a str, kol_id: Uuid },
    Event { event_id: Uuid },
}

/// Attaches source, association, and post details to a scored post.
///
/// `analyzed_at` stays the scoring time; the post's own timestamp goes to
/// `metadata.postedAt`.
pub(crate) fn record_for(post: &FeedPost, scored: ScoredPost, origin: Origin<'_>) -> NewEmotionRecord {
    let mut record = scored.into_new_record();
    let mut extra = Map::new();
    if let Some(id) = &post.post_id {
        extra.insert("postId".into(), json!(id));
    }
    if let Some(at) = post.created_at {
        extra.insert("postedAt".into(), json!(at));
    }
    if let Some(author) = &post.author_username {
        extra.insert("authorUsername".into(), json!(author));
    }
    if let Some(metrics) = &post.metrics {
        extra.insert("metrics".into(), metrics.clone());
    }

    match origin {
        Origin::Kol { username, kol_id } => {
            record.source_id = Some(username.to_owned());
            record.source_type = Some(KOL_SOURCE.to_owned());
            record.kol_id = Some(kol_id);
        }
        Origin::Event { event_id } => {
            record.source_id = Some(event_id.to_string());
            record.source_type = Some(EVENT_SOURCE.to_owned());
            record.event_id = Some(event_id);
            extra.insert("eventId".into(), json!(event_id));
        }
    }

    match &mut record.metadata {
        Some(Value::Object(map)) => map.extend(extra),
        _ => record.metadata = Some(Value::Object(extra)),
    }
    record
}

impl Orchestrator {
    /// Scores `posts` in fetch order and persists them as one batch.
    pub(crate) async fn score_and_store(
        &self,
        posts: &[FeedPost],
        origin: Origin<'_>,
    ) -> Result<Vec<EmotionRecord>, CollectError> {
        let mut inputs = Vec::with_capacity(posts.len());
        for post in posts {
            if post.text.trim().is_empty() {
                tracing::debug!(post_id = ?post.post_id, "skipping post without text");
                continue;
            }
            let scored = self.engine.score_post(&post.text).await;
            inputs.push(record_for(post, scored, origin));
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.create_records(inputs).await?)
    }

    /// Direct text analysis: the local lexicon classifier with the threshold
    /// policy, persisted as a standalone record.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Db`] with a validation error for blank text,
    /// or any store failure.
    pub async fn analyze_text(
        &self,
        text: &str,
        language: Option<String>,
    ) -> Result<EmotionRecord, CollectError> {
        if text.trim().is_empty() {
            return Err(DbError::Invalid(ValidationError::new("text", "must not be empty")).into());
        }
        let mut input = ScoringEngine::score(text, None).into_new_record();
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            input.language = Some(language);
        }
        let record = self.store.create_record(input).await?;
        tracing::debug!(id = %record.id, sentiment = %record.sentiment, "analyzed text");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn post() -> FeedPost {
        FeedPost {
            post_id: Some("p1".into()),
            text: "Shipping the new release today".into(),
            author_username: Some("someone".into()),
            created_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            metrics: Some(json!({ "likes": 12 })),
        }
    }

    #[test]
    fn kol_posts_are_keyed_by_username() {
        let kol_id = Uuid::new_v4();
        let scored = ScoringEngine::score(&post().text, None);
        let record = record_for(
            &post(),
            scored,
            Origin::Kol {
                username: "kol_x",
                kol_id,
            },
        );
        assert_eq!(record.source_id.as_deref(), Some("kol_x"));
        assert_eq!(record.source_type.as_deref(), Some(KOL_SOURCE));
        assert_eq!(record.kol_id, Some(kol_id));
        assert!(record.event_id.is_none());

        let metadata = record.metadata.unwrap();
        assert_eq!(metadata["postId"], "p1");
        assert_eq!(metadata["postedAt"], "2026-03-01T12:00:00Z");
        assert_eq!(metadata["scoredBy"], "lexicon");
    }

    #[test]
    fn event_posts_carry_author_and_metrics() {
        let event_id = Uuid::new_v4();
        let scored = ScoringEngine::score(&post().text, None);
        let record = record_for(&post(), scored, Origin::Event { event_id });
        assert_eq!(record.source_id, Some(event_id.to_string()));
        assert_eq!(record.source_type.as_deref(), Some(EVENT_SOURCE));
        assert_eq!(record.event_id, Some(event_id));

        let metadata = record.metadata.unwrap();
        assert_eq!(metadata["authorUsername"], "someone");
        assert_eq!(metadata["metrics"]["likes"], 12);
        assert_eq!(metadata["eventId"], event_id.to_string());
        assert!(metadata["dominantEmotion"].is_string());
    }
}
