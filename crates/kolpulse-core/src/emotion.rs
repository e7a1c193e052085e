//! Emotion records: one scored post or analysis unit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{check_object, check_unit, ValidationError};

// ---------------------------------------------------------------------------
// Sentiment
// ---------------------------------------------------------------------------

/// Coarse sentiment label derived from the finer-grained scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    /// The three labels that make up heatmap rows, in tie-break order.
    pub const POLAR: [Sentiment; 3] = [Self::Positive, Self::Negative, Self::Neutral];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            "mixed" => Ok(Self::Mixed),
            other => Err(ValidationError::new(
                "sentiment",
                format!("'{other}' is not one of positive, negative, neutral, mixed"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Emotion vector
// ---------------------------------------------------------------------------

/// One of the eight fixed emotion dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Anger,
    Fear,
    Sadness,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
}

impl Emotion {
    /// Fixed enumeration order. Argmax ties resolve to the earliest entry.
    pub const ALL: [Emotion; 8] = [
        Self::Joy,
        Self::Anger,
        Self::Fear,
        Self::Sadness,
        Self::Surprise,
        Self::Disgust,
        Self::Trust,
        Self::Anticipation,
    ];

    /// The five dimensions reported by trend buckets and event comparisons.
    pub const REPORTED: [Emotion; 5] = [
        Self::Joy,
        Self::Anger,
        Self::Fear,
        Self::Sadness,
        Self::Surprise,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Anger => "anger",
            Self::Fear => "fear",
            Self::Sadness => "sadness",
            Self::Surprise => "surprise",
            Self::Disgust => "disgust",
            Self::Trust => "trust",
            Self::Anticipation => "anticipation",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores for the eight emotion dimensions, each in `[0, 1]`.
///
/// Dimensions absent from incoming JSON default to `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionVector {
    pub joy: f64,
    pub anger: f64,
    pub fear: f64,
    pub sadness: f64,
    pub surprise: f64,
    pub disgust: f64,
    pub trust: f64,
    pub anticipation: f64,
}

impl EmotionVector {
    #[must_use]
    pub const fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Joy => self.joy,
            Emotion::Anger => self.anger,
            Emotion::Fear => self.fear,
            Emotion::Sadness => self.sadness,
            Emotion::Surprise => self.surprise,
            Emotion::Disgust => self.disgust,
            Emotion::Trust => self.trust,
            Emotion::Anticipation => self.anticipation,
        }
    }

    pub fn set(&mut self, emotion: Emotion, value: f64) {
        let slot = match emotion {
            Emotion::Joy => &mut self.joy,
            Emotion::Anger => &mut self.anger,
            Emotion::Fear => &mut self.fear,
            Emotion::Sadness => &mut self.sadness,
            Emotion::Surprise => &mut self.surprise,
            Emotion::Disgust => &mut self.disgust,
            Emotion::Trust => &mut self.trust,
            Emotion::Anticipation => &mut self.anticipation,
        };
        *slot = value;
    }

    /// The strongest dimension; ties go to the first entry of [`Emotion::ALL`].
    #[must_use]
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::Joy;
        for emotion in Emotion::ALL {
            if self.get(emotion) > self.get(best) {
                best = emotion;
            }
        }
        best
    }

    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first dimension outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for emotion in Emotion::ALL {
            check_unit(&format!("emotions.{emotion}"), self.get(emotion))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A persisted, scored post.
///
/// Scores are computed together from one emotion vector and are not
/// required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub id: Uuid,
    pub positive_score: f64,
    pub negative_score: f64,
    pub neutral_score: f64,
    pub overall_score: f64,
    pub sentiment: Sentiment,
    pub emotions: Option<EmotionVector>,
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

/// Input for creating an [`EmotionRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmotionRecord {
    pub positive_score: f64,
    pub negative_score: f64,
    pub neutral_score: f64,
    pub overall_score: f64,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub emotions: Option<EmotionVector>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub kol_id: Option<Uuid>,
    #[serde(default)]
    pub event_id: Option<Uuid>,
    /// Scoring time. Defaults to the storage time when absent.
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl NewEmotionRecord {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for the first out-of-range score,
    /// emotion dimension, confidence, or non-object metadata.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_unit("positive_score", self.positive_score)?;
        check_unit("negative_score", self.negative_score)?;
        check_unit("neutral_score", self.neutral_score)?;
        check_unit("overall_score", self.overall_score)?;
        if let Some(emotions) = &self.emotions {
            emotions.validate()?;
        }
        if let Some(confidence) = self.confidence {
            check_unit("confidence", confidence)?;
        }
        if let Some(metadata) = &self.metadata {
            check_object("metadata", metadata)?;
        }
        Ok(())
    }

    /// Builds the stored record. Call [`Self::validate`] first.
    #[must_use]
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> EmotionRecord {
        EmotionRecord {
            id,
            positive_score: self.positive_score,
            negative_score: self.negative_score,
            neutral_score: self.neutral_score,
            overall_score: self.overall_score,
            sentiment: self.sentiment,
            emotions: self.emotions,
            text: self.text,
            language: self.language,
            confidence: self.confidence,
            keywords: self.keywords,
            metadata: self.metadata,
            source_id: self.source_id,
            source_type: self.source_type,
            kol_id: self.kol_id,
            event_id: self.event_id,
            analyzed_at: self.analyzed_at.unwrap_or(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Explicit partial update for an [`EmotionRecord`].
///
/// Only the fields that are `Some` are merged. Every present field is
/// validated before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionPatch {
    pub positive_score: Option<f64>,
    pub negative_score: Option<f64>,
    pub neutral_score: Option<f64>,
    pub overall_score: Option<f64>,
    pub sentiment: Option<Sentiment>,
    pub emotions: Option<EmotionVector>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub confidence: Option<f64>,
    pub keywords: Option<Vec<String>>,
    pub metadata: Option<Value>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub kol_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl EmotionPatch {
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let scores = [
            ("positive_score", self.positive_score),
            ("negative_score", self.negative_score),
            ("neutral_score", self.neutral_score),
            ("overall_score", self.overall_score),
            ("confidence", self.confidence),
        ];
        for (field, value) in scores {
            if let Some(value) = value {
                check_unit(field, value)?;
            }
        }
        if let Some(emotions) = &self.emotions {
            emotions.validate()?;
        }
        if let Some(metadata) = &self.metadata {
            check_object("metadata", metadata)?;
        }
        Ok(())
    }

    /// Merges the present fields into `record` and bumps `updated_at`.
    pub fn apply(self, record: &mut EmotionRecord, now: DateTime<Utc>) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field { record.$field = value; })*
            };
        }
        macro_rules! merge_opt {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field { record.$field = Some(value); })*
            };
        }
        merge!(
            positive_score,
            negative_score,
            neutral_score,
            overall_score,
            sentiment,
            analyzed_at,
        );
        merge_opt!(
            emotions,
            text,
            language,
            confidence,
            keywords,
            metadata,
            source_id,
            source_type,
            kol_id,
            event_id,
        );
        record.updated_at = now;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[path = "emotion_test.rs"]
mod tests;
