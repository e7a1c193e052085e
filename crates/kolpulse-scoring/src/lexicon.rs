//! Deterministic lexicon classifier used when text is scored without an
//! Analyzer result.

use kolpulse_core::{Emotion, EmotionVector};

/// Polarity weights. Keys are lowercase single words. Positive weights are in
/// `(0, 1]`, negative in `[-1, 0)`; the summed score is clamped to `[-1, 1]`.
pub(crate) const POLARITY: &[(&str, f64)] = &[
    // Positive signals
    ("amazing", 0.5),
    ("awesome", 0.5),
    ("best", 0.5),
    ("bullish", 0.4),
    ("congrats", 0.4),
    ("excellent", 0.5),
    ("excited", 0.4),
    ("exciting", 0.4),
    ("fantastic", 0.5),
    ("good", 0.3),
    ("great", 0.4),
    ("growth", 0.3),
    ("happy", 0.4),
    ("incredible", 0.5),
    ("innovation", 0.3),
    ("love", 0.5),
    ("productive", 0.3),
    ("proud", 0.4),
    ("success", 0.4),
    ("thanks", 0.3),
    ("win", 0.4),
    // Negative signals
    ("angry", -0.5),
    ("awful", -0.6),
    ("bad", -0.4),
    ("bearish", -0.4),
    ("cautious", -0.2),
    ("concerned", -0.3),
    ("crash", -0.6),
    ("disappointed", -0.5),
    ("fail", -0.4),
    ("failed", -0.4),
    ("fear", -0.4),
    ("hate", -0.6),
    ("loss", -0.4),
    ("problem", -0.3),
    ("sad", -0.4),
    ("scam", -0.7),
    ("terrible", -0.6),
    ("volatility", -0.3),
    ("worried", -0.4),
    ("worst", -0.6),
];

/// Emotion cue words. A word may cue more than one dimension.
pub(crate) const EMOTION_CUES: &[(&str, Emotion)] = &[
    ("amazing", Emotion::Joy),
    ("awesome", Emotion::Joy),
    ("happy", Emotion::Joy),
    ("love", Emotion::Joy),
    ("excited", Emotion::Anticipation),
    ("exciting", Emotion::Anticipation),
    ("soon", Emotion::Anticipation),
    ("launch", Emotion::Anticipation),
    ("angry", Emotion::Anger),
    ("hate", Emotion::Anger),
    ("scam", Emotion::Anger),
    ("scam", Emotion::Disgust),
    ("gross", Emotion::Disgust),
    ("concerned", Emotion::Fear),
    ("fear", Emotion::Fear),
    ("worried", Emotion::Fear),
    ("crash", Emotion::Fear),
    ("sad", Emotion::Sadness),
    ("disappointed", Emotion::Sadness),
    ("loss", Emotion::Sadness),
    ("incredible", Emotion::Surprise),
    ("surprised", Emotion::Surprise),
    ("unexpected", Emotion::Surprise),
    ("trust", Emotion::Trust),
    ("reliable", Emotion::Trust),
    ("proud", Emotion::Trust),
];

const BASE_CONFIDENCE: f64 = 0.85;
const CONFIDENCE_SPAN: f64 = 0.15;

/// Output of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Sentiment score in `[0, 1]`; 0.5 means no polarity signal.
    pub sentiment_score: f64,
    pub emotions: EmotionVector,
    /// In `[0.85, 1.0]`, rising with distance from the neutral midpoint.
    pub confidence: f64,
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(|word| {
        word.trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase()
    })
}

/// Sums polarity weights for `text`, clamped to `[-1, 1]`. Returns `0.0`
/// for empty or unknown text.
#[must_use]
pub fn lexicon_score(text: &str) -> f64 {
    let score: f64 = words(text)
        .filter_map(|w| {
            POLARITY
                .iter()
                .find(|(lex_word, _)| *lex_word == w)
                .map(|&(_, weight)| weight)
        })
        .sum();
    score.clamp(-1.0, 1.0)
}

/// Emotion vector from cue-word hits, scaled so the most-cued dimension is
/// `1.0`. All zeros when no cue matches.
#[must_use]
pub fn emotion_profile(text: &str) -> EmotionVector {
    let mut hits = EmotionVector::default();
    for w in words(text) {
        for &(cue, emotion) in EMOTION_CUES {
            if cue == w {
                hits.set(emotion, hits.get(emotion) + 1.0);
            }
        }
    }
    let max = Emotion::ALL
        .iter()
        .map(|&e| hits.get(e))
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        for emotion in Emotion::ALL {
            hits.set(emotion, hits.get(emotion) / max);
        }
    }
    hits
}

/// Classifies `text` without any external service.
#[must_use]
pub fn classify(text: &str) -> Classification {
    let sentiment_score = (lexicon_score(text) + 1.0) / 2.0;
    Classification {
        sentiment_score,
        emotions: emotion_profile(text),
        confidence: BASE_CONFIDENCE + CONFIDENCE_SPAN * (sentiment_score - 0.5).abs() * 2.0,
    }
}
