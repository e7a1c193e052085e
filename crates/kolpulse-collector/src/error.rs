use kolpulse_core::ErrorKind;
use kolpulse_db::DbError;
use kolpulse_scoring::ScoringError;
use thiserror::Error;

/// Errors returned by the Source Feed client.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source feed rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no source feed is configured")]
    NotConfigured,
}

impl FeedError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalUnavailable
    }
}

/// Failure of one collection unit (a KOL, an event tick, a direct analysis).
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("source feed: {0}")]
    Feed(#[from] FeedError),

    #[error("analyzer: {0}")]
    Scoring(#[from] ScoringError),
}

impl CollectError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Db(e) => e.kind(),
            Self::Feed(e) => e.kind(),
            Self::Scoring(e) => e.kind(),
        }
    }
}
