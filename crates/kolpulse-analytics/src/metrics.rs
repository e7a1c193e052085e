use kolpulse_core::{AlertLevel, EmotionRecord, EmotionTrend, EventMetrics, Sentiment};

use crate::mean::Mean;

/// Event scores live on a 0-10 scale: mean overall score × 10.
pub const EVENT_SCORE_SCALE: f64 = 10.0;

const POSITIVE_TREND_ABOVE: f64 = 6.0;
const NEGATIVE_TREND_BELOW: f64 = 4.0;
const HIGH_ALERT_RATIO: f64 = 0.5;
const MEDIUM_ALERT_RATIO: f64 = 0.3;

#[must_use]
pub fn trend_for(score: f64) -> EmotionTrend {
    if score > POSITIVE_TREND_ABOVE {
        EmotionTrend::Positive
    } else if score < NEGATIVE_TREND_BELOW {
        EmotionTrend::Negative
    } else {
        EmotionTrend::Neutral
    }
}

#[must_use]
pub fn alert_for(negative_ratio: f64) -> AlertLevel {
    if negative_ratio > HIGH_ALERT_RATIO {
        AlertLevel::High
    } else if negative_ratio > MEDIUM_ALERT_RATIO {
        AlertLevel::Medium
    } else {
        AlertLevel::Low
    }
}

/// Computes an event's derived metrics from its associated records.
///
/// Returns `None` for an empty set so callers leave stored metrics as they
/// are. The result depends only on the records, so recomputing without new
/// records yields the same metrics.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn event_metrics(records: &[EmotionRecord]) -> Option<EventMetrics> {
    if records.is_empty() {
        return None;
    }
    let mut overall = Mean::default();
    let mut negative = 0_u64;
    for record in records {
        overall.push(record.overall_score);
        if record.sentiment == Sentiment::Negative {
            negative += 1;
        }
    }
    let emotion_score = overall.value() * EVENT_SCORE_SCALE;
    let negative_ratio = negative as f64 / overall.count() as f64;
    Some(EventMetrics {
        emotion_score,
        emotion_trend: trend_for(emotion_score),
        alert_level: alert_for(negative_ratio),
        total_posts: i64::try_from(overall.count()).unwrap_or(i64::MAX),
    })
}
