use kolpulse_core::ErrorKind;
use thiserror::Error;

/// Failures talking to the external Analyzer.
///
/// Every variant means the same thing to callers: the Analyzer is
/// unavailable for this text.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analyzer returned status {status}")]
    Status { status: u16 },

    #[error("analyzer did not answer within {secs}s")]
    Timeout { secs: u64 },

    /// The response body could not be deserialized into an analysis.
    #[error("JSON deserialization error for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no analyzer is configured")]
    NotConfigured,
}

impl ScoringError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExternalUnavailable
    }
}
