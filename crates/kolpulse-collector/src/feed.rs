//! The Source Feed capability and its HTTP client.
//!
//! The feed service exposes two endpoints, both answering
//! `{"posts": [...]}`:
//!
//! - `GET {base}/users/{username}/posts` for a KOL's timeline;
//! - `GET {base}/search?q=term&q=term...` for an event's search terms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kolpulse_core::AppConfig;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FeedError;
use crate::retry::retry_with_backoff;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// One post as returned by the feed, in fetch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(default, alias = "tweetId")]
    pub post_id: Option<String>,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: Option<Value>,
}

impl FeedPost {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            post_id: None,
            text: text.into(),
            author_username: None,
            created_at: None,
            metrics: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    posts: Vec<FeedPost>,
}

/// External post retrieval. Any error is recoverable by the caller.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// Latest posts by `username`.
    async fn fetch_user_posts(&self, username: &str) -> Result<Vec<FeedPost>, FeedError>;

    /// Posts matching any of `terms`.
    async fn search(&self, terms: &[String]) -> Result<Vec<FeedPost>, FeedError>;
}

/// Stands in when no feed URL is configured: every call fails with
/// [`FeedError::NotConfigured`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledFeed;

#[async_trait]
impl SourceFeed for DisabledFeed {
    async fn fetch_user_posts(&self, _username: &str) -> Result<Vec<FeedPost>, FeedError> {
        Err(FeedError::NotConfigured)
    }

    async fn search(&self, _terms: &[String]) -> Result<Vec<FeedPost>, FeedError> {
        Err(FeedError::NotConfigured)
    }
}

/// HTTP client for the Source Feed service.
///
/// Rate limiting (429) and transient failures are retried with exponential
/// back-off up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct HttpSourceFeed {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl HttpSourceFeed {
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`FeedError::NotConfigured`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent("kolpulse/0.1 (post-collection)")
            .build()?;

        // A trailing slash keeps joined paths under the configured prefix.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            tracing::error!(base_url, error = %e, "invalid source feed base URL");
            FeedError::NotConfigured
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FeedError::NotConfigured);
        }

        Ok(Self {
            client,
            base_url,
            max_retries,
            backoff_base_ms,
        })
    }

    fn user_posts_url(&self, username: &str) -> Result<Url, FeedError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FeedError::NotConfigured)?
            .pop_if_empty()
            .extend(["users", username, "posts"]);
        Ok(url)
    }

    fn search_url(&self, terms: &[String]) -> Result<Url, FeedError> {
        let mut url = self
            .base_url
            .join("search")
            .map_err(|_| FeedError::NotConfigured)?;
        {
            let mut query = url.query_pairs_mut();
            for term in terms {
                query.append_pair("q", term);
            }
        }
        Ok(url)
    }

    async fn get_posts(&self, url: Url) -> Result<Vec<FeedPost>, FeedError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    return Err(FeedError::RateLimited { retry_after_secs });
                }

                if !status.is_success() {
                    return Err(FeedError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.bytes().await?;
                let parsed: FeedResponse =
                    serde_json::from_slice(&body).map_err(|source| FeedError::Deserialize {
                        context: format!("GET {url}"),
                        source,
                    })?;
                Ok(parsed.posts)
            }
        })
        .await
    }
}

#[async_trait]
impl SourceFeed for HttpSourceFeed {
    async fn fetch_user_posts(&self, username: &str) -> Result<Vec<FeedPost>, FeedError> {
        let url = self.user_posts_url(username)?;
        self.get_posts(url).await
    }

    async fn search(&self, terms: &[String]) -> Result<Vec<FeedPost>, FeedError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.search_url(terms)?;
        self.get_posts(url).await
    }
}

/// Builds the configured feed, or [`DisabledFeed`] when
/// `KOLPULSE_FEED_URL` is unset.
///
/// # Errors
///
/// Returns [`FeedError`] if the HTTP client cannot be built or the URL is
/// invalid.
pub fn feed_from_config(config: &AppConfig) -> Result<Arc<dyn SourceFeed>, FeedError> {
    match config.feed_url.as_deref() {
        Some(url) => Ok(Arc::new(HttpSourceFeed::new(
            url,
            config.feed_timeout_secs,
            config.feed_max_retries,
            config.feed_retry_backoff_base_ms,
        )?)),
        None => {
            tracing::info!("KOLPULSE_FEED_URL not set; collection will find no posts");
            Ok(Arc::new(DisabledFeed))
        }
    }
}
