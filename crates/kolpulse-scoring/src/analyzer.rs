//! The external Analyzer capability and its HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use kolpulse_core::{Emotion, EmotionVector, Sentiment};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// What an Analyzer returns for one text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOutput {
    #[serde(default)]
    pub emotions: EmotionVector,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub dominant_emotion: Option<Emotion>,
}

/// Text classification capability. Any error means "unavailable".
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalyzerOutput, ScoringError>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

/// Calls `POST {base_url}/analyze` with `{"text": ...}`.
///
/// Use [`HttpAnalyzer::new`] with the configured base URL; tests point it at
/// a wiremock server.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: Client,
    url: Url,
}

impl HttpAnalyzer {
    /// # Errors
    ///
    /// Returns [`ScoringError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`ScoringError::NotConfigured`] if `base_url` does not
    /// parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent("kolpulse/0.1 (emotion-scoring)")
            .build()?;

        let normalised = format!("{}/analyze", base_url.trim_end_matches('/'));
        let url = Url::parse(&normalised).map_err(|e| {
            tracing::error!(base_url, error = %e, "invalid analyzer base URL");
            ScoringError::NotConfigured
        })?;

        Ok(Self { client, url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, text: &str) -> Result<AnalyzerOutput, ScoringError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&AnalyzeRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoringError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ScoringError::Decode {
            context: format!("POST {}", self.url),
            source,
        })
    }
}
