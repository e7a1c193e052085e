//! Bounded random emotion vectors used when the Analyzer is unavailable.

use std::sync::Mutex;

use kolpulse_core::{Emotion, EmotionVector, Sentiment};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analyzer::AnalyzerOutput;

/// Upper bound for each dimension's random magnitude.
const CEILINGS: [(Emotion, f64); 8] = [
    (Emotion::Joy, 0.5),
    (Emotion::Trust, 0.5),
    (Emotion::Fear, 0.3),
    (Emotion::Surprise, 0.3),
    (Emotion::Sadness, 0.3),
    (Emotion::Disgust, 0.2),
    (Emotion::Anger, 0.2),
    (Emotion::Anticipation, 0.4),
];

const SENTIMENT_CUTOFF: f64 = 0.6;

/// Labels a fallback vector: positive when joy + trust exceeds 0.6,
/// otherwise negative when fear + sadness + anger exceeds 0.6, otherwise
/// neutral.
#[must_use]
pub fn fallback_sentiment(emotions: &EmotionVector) -> Sentiment {
    if emotions.joy + emotions.trust > SENTIMENT_CUTOFF {
        Sentiment::Positive
    } else if emotions.fear + emotions.sadness + emotions.anger > SENTIMENT_CUTOFF {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Source of fallback analyses. Seed it for reproducible output.
#[derive(Debug)]
pub struct FallbackGenerator {
    rng: Mutex<StdRng>,
}

impl FallbackGenerator {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    #[must_use]
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Draws one fallback analysis. Never fails.
    pub fn generate(&self) -> AnalyzerOutput {
        let mut emotions = EmotionVector::default();
        {
            // A poisoned lock still holds a usable generator.
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for (emotion, ceiling) in CEILINGS {
                emotions.set(emotion, rng.random::<f64>() * ceiling);
            }
        }
        AnalyzerOutput {
            sentiment: fallback_sentiment(&emotions),
            dominant_emotion: Some(emotions.dominant()),
            emotions,
        }
    }
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = FallbackGenerator::seeded(7);
        let b = FallbackGenerator::seeded(7);
        for _ in 0..5 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn magnitudes_respect_ceilings() {
        let generator = FallbackGenerator::seeded(42);
        for _ in 0..500 {
            let out = generator.generate();
            for (emotion, ceiling) in CEILINGS {
                let value = out.emotions.get(emotion);
                assert!(
                    (0.0..ceiling).contains(&value),
                    "{emotion} = {value} outside [0, {ceiling})"
                );
            }
            assert_eq!(out.sentiment, fallback_sentiment(&out.emotions));
            assert_eq!(out.dominant_emotion, Some(out.emotions.dominant()));
        }
    }

    #[test]
    fn sentiment_rules_check_positive_first() {
        let both = EmotionVector {
            joy: 0.4,
            trust: 0.3,
            fear: 0.3,
            sadness: 0.3,
            anger: 0.2,
            ..EmotionVector::default()
        };
        assert_eq!(fallback_sentiment(&both), Sentiment::Positive);

        let negative = EmotionVector {
            fear: 0.3,
            sadness: 0.2,
            anger: 0.15,
            ..EmotionVector::default()
        };
        assert_eq!(fallback_sentiment(&negative), Sentiment::Negative);

        let flat = EmotionVector {
            joy: 0.3,
            trust: 0.3,
            ..EmotionVector::default()
        };
        assert_eq!(fallback_sentiment(&flat), Sentiment::Neutral);
    }

    #[test]
    fn dominant_ties_go_to_first_dimension() {
        let tied = EmotionVector {
            fear: 0.3,
            surprise: 0.3,
            ..EmotionVector::default()
        };
        assert_eq!(tied.dominant(), Emotion::Fear);
    }
}
