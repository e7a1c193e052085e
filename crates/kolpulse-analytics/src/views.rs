//! Read-only derived views over a set of emotion records.
//!
//! Every function takes the already-windowed records; none of them fail.
//! An empty input yields zeroed means rather than an error.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Timelike, Utc};
use kolpulse_core::{EmotionRecord, Granularity, Sentiment};
use serde::Serialize;
use uuid::Uuid;

use crate::mean::{Accumulator, EmotionMeans, Mean, ScoreMeans};

const HOURS: usize = 24;
const DEFAULT_RANKING_LIMIT: usize = 10;

fn count_of(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionStats {
    pub total: i64,
    pub sentiment_distribution: BTreeMap<String, i64>,
    pub average_scores: ScoreMeans,
}

#[must_use]
pub fn stats(records: &[EmotionRecord]) -> EmotionStats {
    let mut acc = Accumulator::default();
    let mut distribution = BTreeMap::new();
    for record in records {
        acc.push(record);
        *distribution
            .entry(record.sentiment.to_string())
            .or_insert(0_i64) += 1;
    }
    EmotionStats {
        total: count_of(acc.records),
        sentiment_distribution: distribution,
        average_scores: acc.scores(),
    }
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub time: DateTime<Utc>,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub overall: f64,
    pub joy: f64,
    pub anger: f64,
    pub fear: f64,
    pub sadness: f64,
    pub surprise: f64,
    pub count: i64,
}

/// Groups records into granularity-aligned buckets, ascending by bucket
/// start. Empty buckets are omitted.
#[must_use]
pub fn trends(records: &[EmotionRecord], granularity: Granularity) -> Vec<TrendBucket> {
    let mut buckets: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();
    for record in records {
        buckets
            .entry(granularity.truncate(record.analyzed_at))
            .or_default()
            .push(record);
    }
    buckets
        .into_iter()
        .map(|(time, acc)| {
            let scores = acc.scores();
            let emotions = acc.emotions();
            TrendBucket {
                time,
                positive: scores.positive,
                negative: scores.negative,
                neutral: scores.neutral,
                overall: scores.overall,
                joy: emotions.joy,
                anger: emotions.anger,
                fear: emotions.fear,
                sadness: emotions.sadness,
                surprise: emotions.surprise,
                count: count_of(acc.records),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Heatmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub hour: u32,
    pub sentiment: Sentiment,
    /// Mean overall score × 100; 0 for an empty cell.
    pub value: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSummary {
    pub total_analyzed: i64,
    pub peak_hour: u32,
    pub dominant_sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    /// 72 cells: sentiments in positive, negative, neutral order, each with
    /// hours 0 through 23.
    pub data: Vec<HeatmapCell>,
    pub summary: HeatmapSummary,
}

/// Hour-of-day × sentiment grid. `mixed` records have no row and are not
/// counted.
#[must_use]
pub fn heatmap(records: &[EmotionRecord]) -> Heatmap {
    let mut grid = [[Mean::default(); HOURS]; 3];
    for record in records {
        let Some(row) = Sentiment::POLAR.iter().position(|s| *s == record.sentiment) else {
            continue;
        };
        grid[row][record.analyzed_at.hour() as usize].push(record.overall_score);
    }

    let mut data = Vec::with_capacity(3 * HOURS);
    for (sentiment, row) in Sentiment::POLAR.into_iter().zip(&grid) {
        for (hour, cell) in (0_u32..).zip(row) {
            data.push(HeatmapCell {
                hour,
                sentiment,
                value: cell.value() * 100.0,
                count: count_of(cell.count()),
            });
        }
    }

    let hour_totals: Vec<u64> = (0..HOURS)
        .map(|h| grid.iter().map(|row| row[h].count()).sum())
        .collect();
    let mut peak_hour = 0_u32;
    let mut peak_count = 0_u64;
    for (hour, &count) in (0_u32..).zip(&hour_totals) {
        if count > peak_count {
            peak_count = count;
            peak_hour = hour;
        }
    }

    let mut dominant_sentiment = Sentiment::Neutral;
    let mut dominant_count = 0_u64;
    for (sentiment, row) in Sentiment::POLAR.into_iter().zip(&grid) {
        let count: u64 = row.iter().map(Mean::count).sum();
        if count > dominant_count {
            dominant_count = count;
            dominant_sentiment = sentiment;
        }
    }

    Heatmap {
        data,
        summary: HeatmapSummary {
            total_analyzed: count_of(hour_totals.iter().sum()),
            peak_hour,
            dominant_sentiment,
        },
    }
}

// ---------------------------------------------------------------------------
// KOL influence ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KolInfluenceRow {
    pub kol_id: Uuid,
    /// Filled in by the store-backed aggregator.
    pub username: Option<String>,
    pub post_count: i64,
    pub avg_sentiment: f64,
    pub positive_count: i64,
    pub negative_count: i64,
    pub avg_confidence: f64,
    pub influence_score: f64,
}

/// `(0.3 × posts + 0.5 × mean_overall × 100 + 0.2 × mean_confidence × 100) / 100`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ranking_influence(post_count: i64, avg_sentiment: f64, avg_confidence: f64) -> f64 {
    (post_count as f64 * 0.3 + avg_sentiment * 100.0 * 0.5 + avg_confidence * 100.0 * 0.2) / 100.0
}

#[derive(Default)]
struct KolTally {
    overall: Mean,
    confidence: Mean,
    positive: u64,
    negative: u64,
}

/// Per-KOL ranking ordered by post count, descending, truncated to `limit`
/// (10 when `None`). Records without a KOL are ignored.
#[must_use]
pub fn kol_influence(records: &[EmotionRecord], limit: Option<usize>) -> Vec<KolInfluenceRow> {
    let mut tallies: HashMap<Uuid, KolTally> = HashMap::new();
    for record in records {
        let Some(kol_id) = record.kol_id else {
            continue;
        };
        let tally = tallies.entry(kol_id).or_default();
        tally.overall.push(record.overall_score);
        if let Some(confidence) = record.confidence {
            tally.confidence.push(confidence);
        }
        match record.sentiment {
            Sentiment::Positive => tally.positive += 1,
            Sentiment::Negative => tally.negative += 1,
            Sentiment::Neutral | Sentiment::Mixed => {}
        }
    }

    let mut rows: Vec<KolInfluenceRow> = tallies
        .into_iter()
        .map(|(kol_id, tally)| {
            let post_count = count_of(tally.overall.count());
            let avg_sentiment = tally.overall.value();
            let avg_confidence = tally.confidence.value();
            KolInfluenceRow {
                kol_id,
                username: None,
                post_count,
                avg_sentiment,
                positive_count: count_of(tally.positive),
                negative_count: count_of(tally.negative),
                avg_confidence,
                influence_score: ranking_influence(post_count, avg_sentiment, avg_confidence),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.post_count
            .cmp(&a.post_count)
            .then_with(|| a.kol_id.cmp(&b.kol_id))
    });
    rows.truncate(limit.unwrap_or(DEFAULT_RANKING_LIMIT));
    rows
}

// ---------------------------------------------------------------------------
// Event comparison
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventComparisonRow {
    pub event_id: Uuid,
    /// Filled in by the store-backed aggregator.
    pub event_name: Option<String>,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub total_posts: i64,
    pub emotions: EmotionMeans,
}

/// Per-event means, restricted to `event_ids` when it is non-empty. Rows
/// are ordered by total posts, descending. Records without an event are
/// ignored.
#[must_use]
pub fn event_comparison(records: &[EmotionRecord], event_ids: &[Uuid]) -> Vec<EventComparisonRow> {
    let mut groups: HashMap<Uuid, Accumulator> = HashMap::new();
    for record in records {
        let Some(event_id) = record.event_id else {
            continue;
        };
        if !event_ids.is_empty() && !event_ids.contains(&event_id) {
            continue;
        }
        groups.entry(event_id).or_default().push(record);
    }

    let mut rows: Vec<EventComparisonRow> = groups
        .into_iter()
        .map(|(event_id, acc)| {
            let scores = acc.scores();
            EventComparisonRow {
                event_id,
                event_name: None,
                positive: scores.positive,
                negative: scores.negative,
                neutral: scores.neutral,
                total_posts: count_of(acc.records),
                emotions: acc.emotions(),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_posts
            .cmp(&a.total_posts)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
    rows
}

#[cfg(test)]
#[path = "views_test.rs"]
mod tests;
