//! Monitored events and their status state machine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{check_object, ValidationError};

macro_rules! label_enum {
    (
        $(#[$attr:meta])*
        $name:ident, $field:literal, { $($(#[$vattr:meta])* $variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vattr])* $variant),+
        }

        impl $name {
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)+
                    other => Err(ValidationError::new(
                        $field,
                        format!("unknown value '{other}'"),
                    )),
                }
            }
        }
    };
}

label_enum!(
    #[derive(Default)]
    EventType, "type", {
        #[default]
        Monitoring => "monitoring",
        Campaign => "campaign",
        Crisis => "crisis",
        Research => "research",
    }
);

label_enum!(EventStatus, "status", {
    Upcoming => "upcoming",
    Active => "active",
    Completed => "completed",
});

label_enum!(EmotionTrend, "emotion_trend", {
    Positive => "positive",
    Negative => "negative",
    Neutral => "neutral",
});

label_enum!(AlertLevel, "alert_level", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl EventStatus {
    /// Status for a freshly created event: `active` when `now` falls inside
    /// the window, `upcoming` otherwise.
    #[must_use]
    pub fn initial(
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        if window_contains(start_date, end_date, now) {
            Self::Active
        } else {
            Self::Upcoming
        }
    }

    /// Only `upcoming -> active` and `active -> completed` are legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Upcoming, Self::Active) | (Self::Active, Self::Completed)
        )
    }
}

fn window_contains(
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    start_date <= now && end_date.is_none_or(|end| now <= end)
}

/// A monitored topic over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub source: Option<String>,
    pub data: Option<Value>,
    pub status: EventStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    /// Mean overall score of associated records on a 0–10 scale.
    pub emotion_score: f64,
    pub emotion_trend: EmotionTrend,
    pub alert_level: AlertLevel,
    pub total_posts: i64,
    pub keywords: Vec<String>,
    pub hashtags: Vec<String>,
    pub user_id: Option<Uuid>,
    pub kol_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// `upcoming` event whose start condition holds at `now`.
    #[must_use]
    pub fn should_activate(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Upcoming && window_contains(self.start_date, self.end_date, now)
    }

    /// `active` event whose end date has passed.
    #[must_use]
    pub fn should_complete(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Active && self.end_date.is_some_and(|end| end <= now)
    }

    #[must_use]
    pub fn metrics(&self) -> EventMetrics {
        EventMetrics {
            emotion_score: self.emotion_score,
            emotion_trend: self.emotion_trend,
            alert_level: self.alert_level,
            total_posts: self.total_posts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub kol_ids: Vec<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl NewEvent {
    #[must_use]
    pub fn new(name: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            description: None,
            event_type: EventType::default(),
            source: None,
            data: None,
            start_date,
            end_date: None,
            keywords: Vec::new(),
            hashtags: Vec::new(),
            kol_ids: Vec::new(),
            user_id: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty name, an end date before the
    /// start date, or non-object `data`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_window(self.start_date, self.end_date)?;
        if let Some(data) = &self.data {
            check_object("data", data)?;
        }
        Ok(())
    }

    /// Builds the stored event with neutral metrics. `kol_ids` is left for
    /// the store to fill with the associations it actually created.
    #[must_use]
    pub fn into_event(self, id: Uuid, status: EventStatus, now: DateTime<Utc>) -> Event {
        Event {
            id,
            name: self.name,
            description: self.description,
            event_type: self.event_type,
            source: self.source,
            data: self.data,
            status,
            start_date: self.start_date,
            end_date: self.end_date,
            emotion_score: 0.0,
            emotion_trend: EmotionTrend::Neutral,
            alert_level: AlertLevel::Low,
            total_posts: 0,
            keywords: self.keywords,
            hashtags: self.hashtags,
            user_id: self.user_id,
            kol_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Explicit partial update for an [`Event`].
///
/// Status and metrics are driven by the sweeps and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub source: Option<String>,
    pub data: Option<Value>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub keywords: Option<Vec<String>>,
    pub hashtags: Option<Vec<String>>,
}

impl EventPatch {
    /// Validates the patch against the event it will be applied to, so the
    /// merged window is checked before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the first invalid field.
    pub fn validate(&self, current: &Event) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(data) = &self.data {
            check_object("data", data)?;
        }
        validate_window(
            self.start_date.unwrap_or(current.start_date),
            self.end_date.or(current.end_date),
        )
    }

    pub fn apply(self, event: &mut Event, now: DateTime<Utc>) {
        if let Some(v) = self.name {
            event.name = v;
        }
        if let Some(v) = self.description {
            event.description = Some(v);
        }
        if let Some(v) = self.event_type {
            event.event_type = v;
        }
        if let Some(v) = self.source {
            event.source = Some(v);
        }
        if let Some(v) = self.data {
            event.data = Some(v);
        }
        if let Some(v) = self.start_date {
            event.start_date = v;
        }
        if let Some(v) = self.end_date {
            event.end_date = Some(v);
        }
        if let Some(v) = self.keywords {
            event.keywords = v;
        }
        if let Some(v) = self.hashtags {
            event.hashtags = v;
        }
        event.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name", "must not be empty"));
    }
    Ok(())
}

fn validate_window(
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match end_date {
        Some(end) if end < start_date => Err(ValidationError::new(
            "end_date",
            format!("{end} is before start_date {start_date}"),
        )),
        _ => Ok(()),
    }
}

/// Derived metrics written by the metrics sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventMetrics {
    pub emotion_score: f64,
    pub emotion_trend: EmotionTrend,
    pub alert_level: AlertLevel,
    pub total_posts: i64,
}

/// Aggregate counts across all events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOverview {
    pub total: i64,
    pub active: i64,
    pub high_alerts: i64,
    pub total_posts: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

/// The Source Feed search terms for an event: keywords as-is, then
/// `#hashtag`s, then `@username`s, keeping first occurrence order and
/// dropping duplicates and blanks.
#[must_use]
pub fn search_terms(keywords: &[String], hashtags: &[String], usernames: &[String]) -> Vec<String> {
    let tagged = hashtags
        .iter()
        .map(|tag| format!("#{}", tag.trim().trim_start_matches('#')));
    let mentioned = usernames
        .iter()
        .map(|name| format!("@{}", name.trim().trim_start_matches('@')));

    let mut terms: Vec<String> = Vec::new();
    for term in keywords
        .iter()
        .map(|k| k.trim().to_string())
        .chain(tagged)
        .chain(mentioned)
    {
        let blank = term.is_empty() || term == "#" || term == "@";
        if !blank && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
