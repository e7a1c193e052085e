//! Collection Orchestrator and the Source Feed client.
//!
//! The orchestrator pulls posts from the feed for active KOLs and monitored
//! events, scores them, stores the records, and keeps KOL scores and event
//! statuses/metrics current through three periodic sweeps.

pub mod error;
pub mod feed;
pub mod monitor;
pub mod orchestrator;

mod retry;

pub use error::{CollectError, FeedError};
pub use feed::{feed_from_config, DisabledFeed, FeedPost, HttpSourceFeed, SourceFeed};
pub use monitor::Monitors;
pub use orchestrator::{
    BatchImportReport, CollectorSettings, KolCollection, Orchestrator, StatusSweepReport,
    SweepReport,
};
