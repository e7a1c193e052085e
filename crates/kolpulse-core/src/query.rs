//! Filters, pagination, and time bucketing shared by the store and the
//! aggregator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emotion::{EmotionRecord, Sentiment};
use crate::event::{EventStatus, EventType};
use crate::error::ValidationError;

const MAX_PAGE_SIZE: u32 = 1000;

/// The optional (start, end, event, kol) window every aggregate view is
/// filtered by. Each bound applies on its own and is inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Window {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub event_id: Option<Uuid>,
    pub kol_id: Option<Uuid>,
}

impl Window {
    #[must_use]
    pub fn for_event(event_id: Uuid) -> Self {
        Self {
            event_id: Some(event_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_kol(kol_id: Uuid) -> Self {
        Self {
            kol_id: Some(kol_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, record: &EmotionRecord) -> bool {
        self.start_date.is_none_or(|start| record.analyzed_at >= start)
            && self.end_date.is_none_or(|end| record.analyzed_at <= end)
            && self.event_id.is_none_or(|id| record.event_id == Some(id))
            && self.kol_id.is_none_or(|id| record.kol_id == Some(id))
    }
}

/// Record listing filter. Results are ordered by `analyzed_at` descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordQuery {
    #[serde(flatten)]
    pub window: Window,
    pub sentiment: Option<Sentiment>,
    pub page: u32,
    pub limit: u32,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            window: Window::default(),
            sentiment: None,
            page: 1,
            limit: 10,
        }
    }
}

impl RecordQuery {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a zero page, or a limit outside
    /// `1..=1000`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_paging(self.page, self.limit)
    }

    #[must_use]
    pub fn matches(&self, record: &EmotionRecord) -> bool {
        self.window.matches(record) && self.sentiment.is_none_or(|s| record.sentiment == s)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        offset(self.page, self.limit)
    }
}

/// Event listing filter. Results are ordered by `start_date` descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventQuery {
    /// Case-insensitive substring of the event name.
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
    pub page: u32,
    pub limit: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            search: None,
            event_type: None,
            status: None,
            page: 1,
            limit: 10,
        }
    }
}

impl EventQuery {
    /// # Errors
    ///
    /// Same paging rules as [`RecordQuery::validate`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_paging(self.page, self.limit)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        offset(self.page, self.limit)
    }
}

fn validate_paging(page: u32, limit: u32) -> Result<(), ValidationError> {
    if page == 0 {
        return Err(ValidationError::new("page", "must be at least 1"));
    }
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(ValidationError::new(
            "limit",
            format!("must be between 1 and {MAX_PAGE_SIZE}, got {limit}"),
        ));
    }
    Ok(())
}

fn offset(page: u32, limit: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(limit)
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Trend bucket width. Buckets are aligned in UTC; weeks start on Monday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Start of the bucket containing `ts`.
    #[must_use]
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Self::Hour => date.and_hms_opt(ts.hour(), 0, 0),
            Self::Day => date.and_hms_opt(0, 0, 0),
            Self::Week => date
                .checked_sub_days(Days::new(u64::from(
                    date.weekday().num_days_from_monday(),
                )))
                .and_then(|monday| monday.and_hms_opt(0, 0, 0)),
            Self::Month => date
                .with_day(1)
                .and_then(|first: NaiveDate| first.and_hms_opt(0, 0, 0)),
        };
        start.map_or(ts, |naive| naive.and_utc())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(ValidationError::new(
                "granularity",
                format!("'{other}' is not one of hour, day, week, month"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn record_at(at: DateTime<Utc>) -> EmotionRecord {
        EmotionRecord {
            id: Uuid::new_v4(),
            positive_score: 0.8,
            negative_score: 0.2,
            neutral_score: 0.2,
            overall_score: 0.8,
            sentiment: Sentiment::Positive,
            emotions: None,
            text: None,
            language: None,
            confidence: None,
            keywords: None,
            metadata: None,
            source_id: None,
            source_type: None,
            kol_id: None,
            event_id: None,
            analyzed_at: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn hour_truncation_drops_minutes() {
        assert_eq!(
            Granularity::Hour.truncate(ts(2026, 4, 15, 13, 47)),
            ts(2026, 4, 15, 13, 0)
        );
    }

    #[test]
    fn day_truncation_is_midnight_utc() {
        assert_eq!(
            Granularity::Day.truncate(ts(2026, 4, 15, 23, 59)),
            ts(2026, 4, 15, 0, 0)
        );
    }

    #[test]
    fn week_truncation_lands_on_monday() {
        // 2026-04-15 is a Wednesday.
        assert_eq!(
            Granularity::Week.truncate(ts(2026, 4, 15, 9, 0)),
            ts(2026, 4, 13, 0, 0)
        );
        // Monday maps to itself.
        assert_eq!(
            Granularity::Week.truncate(ts(2026, 4, 13, 9, 0)),
            ts(2026, 4, 13, 0, 0)
        );
    }

    #[test]
    fn month_truncation_is_first_of_month() {
        assert_eq!(
            Granularity::Month.truncate(ts(2026, 2, 28, 9, 0)),
            ts(2026, 2, 1, 0, 0)
        );
    }

    #[test]
    fn granularity_rejects_unknown() {
        assert_eq!(
            "fortnight".parse::<Granularity>().unwrap_err().field,
            "granularity"
        );
    }

    #[test]
    fn window_bounds_are_inclusive_and_independent() {
        let r = record_at(ts(2026, 4, 15, 12, 0));
        let only_start = Window {
            start_date: Some(ts(2026, 4, 15, 12, 0)),
            ..Window::default()
        };
        let only_end = Window {
            end_date: Some(ts(2026, 4, 15, 12, 0)),
            ..Window::default()
        };
        let after = Window {
            start_date: Some(ts(2026, 4, 15, 12, 1)),
            ..Window::default()
        };
        assert!(only_start.matches(&r));
        assert!(only_end.matches(&r));
        assert!(!after.matches(&r));
    }

    #[test]
    fn window_filters_by_association() {
        let kol = Uuid::new_v4();
        let mut r = record_at(ts(2026, 4, 15, 12, 0));
        assert!(!Window::for_kol(kol).matches(&r));
        r.kol_id = Some(kol);
        assert!(Window::for_kol(kol).matches(&r));
        assert!(!Window::for_event(Uuid::new_v4()).matches(&r));
    }

    #[test]
    fn record_query_defaults_and_offset() {
        let q = RecordQuery::default();
        assert_eq!((q.page, q.limit), (1, 10));
        assert_eq!(q.offset(), 0);
        let q = RecordQuery {
            page: 3,
            limit: 25,
            ..RecordQuery::default()
        };
        assert_eq!(q.offset(), 50);
    }

    #[test]
    fn record_query_rejects_zero_page_and_limit() {
        let q = RecordQuery {
            page: 0,
            ..RecordQuery::default()
        };
        assert_eq!(q.validate().unwrap_err().field, "page");
        let q = RecordQuery {
            limit: 0,
            ..RecordQuery::default()
        };
        assert_eq!(q.validate().unwrap_err().field, "limit");
    }

    #[test]
    fn record_query_filters_sentiment() {
        let r = record_at(ts(2026, 4, 15, 12, 0));
        let q = RecordQuery {
            sentiment: Some(Sentiment::Negative),
            ..RecordQuery::default()
        };
        assert!(!q.matches(&r));
    }
}
