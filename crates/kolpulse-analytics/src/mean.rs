use kolpulse_core::{Emotion, EmotionRecord};
use serde::Serialize;

/// Running arithmetic mean. An empty mean reads as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Mean of the four record scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreMeans {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub overall: f64,
}

/// Mean of the five reported emotion dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EmotionMeans {
    pub joy: f64,
    pub anger: f64,
    pub fear: f64,
    pub sadness: f64,
    pub surprise: f64,
}

/// Accumulates score and emotion means over a group of records.
///
/// Emotion means only count records that carry an emotion vector.
#[derive(Debug, Clone, Default)]
pub(crate) struct Accumulator {
    pub(crate) records: u64,
    positive: Mean,
    negative: Mean,
    neutral: Mean,
    overall: Mean,
    emotions: [Mean; 5],
}

impl Accumulator {
    pub(crate) fn push(&mut self, record: &EmotionRecord) {
        self.records += 1;
        self.positive.push(record.positive_score);
        self.negative.push(record.negative_score);
        self.neutral.push(record.neutral_score);
        self.overall.push(record.overall_score);
        if let Some(vector) = &record.emotions {
            for (slot, emotion) in self.emotions.iter_mut().zip(Emotion::REPORTED) {
                slot.push(vector.get(emotion));
            }
        }
    }

    pub(crate) fn scores(&self) -> ScoreMeans {
        ScoreMeans {
            positive: self.positive.value(),
            negative: self.negative.value(),
            neutral: self.neutral.value(),
            overall: self.overall.value(),
        }
    }

    pub(crate) fn emotions(&self) -> EmotionMeans {
        let [joy, anger, fear, sadness, surprise] = self.emotions.map(|m| m.value());
        EmotionMeans {
            joy,
            anger,
            fear,
            sadness,
            surprise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mean_is_zero() {
        assert_eq!(Mean::default().value(), 0.0);
    }

    #[test]
    fn mean_of_values() {
        let mut mean = Mean::default();
        for v in [0.8, 0.8, 0.2] {
            mean.push(v);
        }
        assert_eq!(mean.count(), 3);
        assert!((mean.value() - 0.6).abs() < 1e-9);
    }
}
