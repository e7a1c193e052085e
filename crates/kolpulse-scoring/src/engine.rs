//! Turns text plus an optional Analyzer result into record-shaped scores.

use std::sync::Arc;
use std::time::Duration;

use kolpulse_core::{AppConfig, Emotion, EmotionVector, NewEmotionRecord, Sentiment};
use serde_json::json;

use crate::analyzer::{Analyzer, AnalyzerOutput, HttpAnalyzer};
use crate::error::ScoringError;
use crate::fallback::FallbackGenerator;
use crate::keywords::extract_keywords;
use crate::lexicon::classify;
use crate::policy::{continuous, quantized, threshold_sentiment, Scores};

const DEFAULT_LANGUAGE: &str = "en";

/// Which path produced a [`ScoredPost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Analyzer,
    Fallback,
    Lexicon,
}

impl Provenance {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Analyzer => "analyzer",
            Self::Fallback => "fallback",
            Self::Lexicon => "lexicon",
        }
    }
}

/// A scored text, ready to become an [`NewEmotionRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPost {
    pub text: String,
    pub scores: Scores,
    pub sentiment: Sentiment,
    pub emotions: EmotionVector,
    pub dominant_emotion: Emotion,
    pub confidence: Option<f64>,
    pub keywords: Vec<String>,
    pub provenance: Provenance,
}

impl ScoredPost {
    /// Builds the record input. Source, associations and extra metadata are
    /// left for the caller; `metadata` carries the dominant emotion and
    /// provenance.
    #[must_use]
    pub fn into_new_record(self) -> NewEmotionRecord {
        NewEmotionRecord {
            positive_score: self.scores.positive,
            negative_score: self.scores.negative,
            neutral_score: self.scores.neutral,
            overall_score: self.scores.overall,
            sentiment: self.sentiment,
            emotions: Some(self.emotions),
            text: Some(self.text),
            language: Some(DEFAULT_LANGUAGE.to_string()),
            confidence: self.confidence,
            keywords: Some(self.keywords),
            metadata: Some(json!({
                "dominantEmotion": self.dominant_emotion.as_str(),
                "scoredBy": self.provenance.as_str(),
            })),
            source_id: None,
            source_type: None,
            kol_id: None,
            event_id: None,
            analyzed_at: None,
        }
    }
}

fn quantize(text: &str, output: &AnalyzerOutput, provenance: Provenance) -> ScoredPost {
    // External vectors are not trusted to stay in range.
    let mut emotions = output.emotions;
    for emotion in Emotion::ALL {
        emotions.set(emotion, emotions.get(emotion).clamp(0.0, 1.0));
    }
    ScoredPost {
        text: text.to_string(),
        scores: quantized(output.sentiment),
        sentiment: output.sentiment,
        emotions,
        dominant_emotion: output
            .dominant_emotion
            .unwrap_or_else(|| emotions.dominant()),
        confidence: None,
        keywords: extract_keywords(text),
        provenance,
    }
}

fn classify_locally(text: &str) -> ScoredPost {
    let classification = classify(text);
    ScoredPost {
        text: text.to_string(),
        scores: continuous(classification.sentiment_score),
        sentiment: threshold_sentiment(classification.sentiment_score),
        emotions: classification.emotions,
        dominant_emotion: classification.emotions.dominant(),
        confidence: Some(classification.confidence),
        keywords: extract_keywords(text),
        provenance: Provenance::Lexicon,
    }
}

/// Scoring Engine: wraps an optional Analyzer with a bounded call time and a
/// fallback generator.
pub struct ScoringEngine {
    analyzer: Option<Arc<dyn Analyzer>>,
    fallback: FallbackGenerator,
    timeout: Duration,
}

impl ScoringEngine {
    #[must_use]
    pub fn new(analyzer: Option<Arc<dyn Analyzer>>, timeout: Duration) -> Self {
        Self {
            analyzer,
            fallback: FallbackGenerator::default(),
            timeout,
        }
    }

    /// Replaces the fallback source, e.g. with a seeded one in tests.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackGenerator) -> Self {
        self.fallback = fallback;
        self
    }

    /// Builds an engine from `KOLPULSE_ANALYZER_URL` and
    /// `KOLPULSE_ANALYZER_TIMEOUT_SECS`. No URL means every analysis falls
    /// back.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScoringError> {
        let analyzer: Option<Arc<dyn Analyzer>> = match config.analyzer_url.as_deref() {
            Some(url) => Some(Arc::new(HttpAnalyzer::new(
                url,
                config.analyzer_timeout_secs,
            )?)),
            None => None,
        };
        Ok(Self::new(
            analyzer,
            Duration::from_secs(config.analyzer_timeout_secs),
        ))
    }

    #[must_use]
    pub fn has_analyzer(&self) -> bool {
        self.analyzer.is_some()
    }

    /// Scores `text`. With an Analyzer result the quantization policy
    /// applies; without one the local lexicon classifier and the threshold
    /// policy apply.
    #[must_use]
    pub fn score(text: &str, analyzer_result: Option<&AnalyzerOutput>) -> ScoredPost {
        match analyzer_result {
            Some(output) => quantize(text, output, Provenance::Analyzer),
            None => classify_locally(text),
        }
    }

    /// Calls the Analyzer within the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::NotConfigured`] without an Analyzer,
    /// [`ScoringError::Timeout`] when the call runs long, or the Analyzer's
    /// own error.
    pub async fn analyze(&self, text: &str) -> Result<AnalyzerOutput, ScoringError> {
        let analyzer = self.analyzer.as_ref().ok_or(ScoringError::NotConfigured)?;
        tokio::time::timeout(self.timeout, analyzer.analyze(text))
            .await
            .map_err(|_| ScoringError::Timeout {
                secs: self.timeout.as_secs(),
            })?
    }

    /// Like [`Self::analyze`], but any failure yields a fallback analysis.
    pub async fn analyze_or_fallback(&self, text: &str) -> (AnalyzerOutput, Provenance) {
        match self.analyze(text).await {
            Ok(output) => (output, Provenance::Analyzer),
            Err(ScoringError::NotConfigured) => (self.fallback.generate(), Provenance::Fallback),
            Err(e) => {
                tracing::warn!(error = %e, "analyzer unavailable; using fallback emotions");
                (self.fallback.generate(), Provenance::Fallback)
            }
        }
    }

    /// The collection path: Analyzer (or fallback) then quantization. Never
    /// fails.
    pub async fn score_post(&self, text: &str) -> ScoredPost {
        let (output, provenance) = self.analyze_or_fallback(text).await;
        tracing::debug!(
            sentiment = %output.sentiment,
            scored_by = provenance.as_str(),
            "scored post"
        );
        quantize(text, &output, provenance)
    }

    /// Direct scoring with no fallback: Analyzer errors are returned.
    ///
    /// # Errors
    ///
    /// Same as [`Self::analyze`].
    pub async fn score_strict(&self, text: &str) -> Result<ScoredPost, ScoringError> {
        let output = self.analyze(text).await?;
        Ok(quantize(text, &output, Provenance::Analyzer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_result_is_quantized() {
        let output = AnalyzerOutput {
            emotions: EmotionVector {
                anger: 0.7,
                ..EmotionVector::default()
            },
            sentiment: Sentiment::Negative,
            dominant_emotion: None,
        };
        let post = ScoringEngine::score("markets are down again", Some(&output));
        assert_eq!(post.scores.positive, 0.2);
        assert_eq!(post.scores.negative, 0.8);
        assert_eq!(post.scores.neutral, 0.2);
        assert_eq!(post.scores.overall, 0.2);
        assert_eq!(post.dominant_emotion, Emotion::Anger);
        assert_eq!(post.provenance, Provenance::Analyzer);
        assert_eq!(post.keywords, vec!["markets", "down", "again"]);
    }

    #[test]
    fn text_without_result_uses_the_lexicon() {
        let post = ScoringEngine::score("What an amazing launch, love it", None);
        assert_eq!(post.sentiment, Sentiment::Positive);
        assert_eq!(post.provenance, Provenance::Lexicon);
        assert!(post.scores.overall > 0.6);
        let confidence = post.confidence.unwrap();
        assert!((0.85..=1.0).contains(&confidence));
    }

    #[test]
    fn record_carries_dominant_emotion_and_language() {
        let post = ScoringEngine::score("so sad and disappointed", None);
        let record = post.into_new_record();
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(record.sentiment, Sentiment::Negative);
        let metadata = record.metadata.as_ref().unwrap();
        assert_eq!(metadata["dominantEmotion"], "sadness");
        assert_eq!(metadata["scoredBy"], "lexicon");
        assert!(record.validate().is_ok());
    }

    #[tokio::test]
    async fn missing_analyzer_falls_back_silently() {
        let engine = ScoringEngine::new(None, Duration::from_secs(1))
            .with_fallback(FallbackGenerator::seeded(3));
        let (_, provenance) = engine.analyze_or_fallback("anything").await;
        assert_eq!(provenance, Provenance::Fallback);
        assert!(matches!(
            engine.score_strict("anything").await,
            Err(ScoringError::NotConfigured)
        ));
    }
}
