//! Score derivation policies.
//!
//! Two policies turn a classification into the four record scores:
//! the coarse quantization applied to Analyzer labels, and the continuous
//! threshold policy applied to a sentiment score in `[0, 1]`.

use kolpulse_core::Sentiment;

/// `sentiment_score` above this is positive.
pub const POSITIVE_THRESHOLD: f64 = 0.6;
/// `sentiment_score` below this is negative.
pub const NEGATIVE_THRESHOLD: f64 = 0.4;

const HIT: f64 = 0.8;
const MISS: f64 = 0.2;
const MIDPOINT: f64 = 0.5;

/// The four record scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub overall: f64,
}

/// Quantizes an Analyzer label: 0.8 for the matching score and 0.2 for the
/// others; overall is 0.8 / 0.2 / 0.5 for positive / negative / anything else.
#[must_use]
pub fn quantized(sentiment: Sentiment) -> Scores {
    let pick = |label: Sentiment| if sentiment == label { HIT } else { MISS };
    let overall = match sentiment {
        Sentiment::Positive => HIT,
        Sentiment::Negative => MISS,
        Sentiment::Neutral | Sentiment::Mixed => MIDPOINT,
    };
    Scores {
        positive: pick(Sentiment::Positive),
        negative: pick(Sentiment::Negative),
        neutral: pick(Sentiment::Neutral),
        overall,
    }
}

/// Labels a sentiment score with the 0.6 / 0.4 thresholds.
#[must_use]
pub fn threshold_sentiment(sentiment_score: f64) -> Sentiment {
    if sentiment_score > POSITIVE_THRESHOLD {
        Sentiment::Positive
    } else if sentiment_score < NEGATIVE_THRESHOLD {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Derives all four scores from a sentiment score in `[0, 1]`.
///
/// Out-of-range input is clamped first so the outputs stay in `[0, 1]`.
#[must_use]
pub fn continuous(sentiment_score: f64) -> Scores {
    let s = sentiment_score.clamp(0.0, 1.0);
    let positive = if s > MIDPOINT { s } else { MIDPOINT - s };
    let negative = if s < MIDPOINT { 1.0 - s } else { s - MIDPOINT };
    let neutral = 1.0 - (s - MIDPOINT).abs() * 2.0;
    Scores {
        positive,
        negative,
        neutral,
        overall: s,
    }
}
