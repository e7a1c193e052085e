//! Domain model shared by every kolpulse crate.
//!
//! Holds the emotion record, KOL and event types, their validation and patch
//! structures, the query/window types used by the store and aggregator, and
//! the environment-driven application configuration.

pub mod app_config;
pub mod config;
pub mod emotion;
pub mod event;
pub mod kol;
pub mod query;

mod error;

pub use app_config::{AppConfig, Environment, StoreBackend};
pub use config::{load_app_config, load_app_config_from_env};
pub use emotion::{
    Emotion, EmotionPatch, EmotionRecord, EmotionVector, NewEmotionRecord, Sentiment,
};
pub use error::{ConfigError, ErrorKind, ValidationError};
pub use event::{
    search_terms, AlertLevel, EmotionTrend, Event, EventMetrics, EventOverview, EventPatch,
    EventStatus, EventType, NewEvent,
};
pub use kol::{Kol, KolPatch, NewKol, MAX_ACTIVE_KOLS};
pub use query::{EventQuery, Granularity, Page, RecordQuery, Window};
