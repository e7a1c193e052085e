//! Aggregation over emotion records: stats, trends, heatmap, KOL ranking,
//! event comparison, event metrics, and the per-KOL influence calculator.

pub mod aggregator;
pub mod influence;
pub mod mean;
pub mod metrics;
pub mod views;

pub use aggregator::Aggregator;
pub use influence::{average_grade, grade, influence_score, InfluenceCalculator, RECENT_WINDOW};
pub use mean::{EmotionMeans, ScoreMeans};
pub use metrics::{event_metrics, EVENT_SCORE_SCALE};
pub use views::{
    EmotionStats, EventComparisonRow, Heatmap, HeatmapCell, HeatmapSummary, KolInfluenceRow,
    TrendBucket,
};
