//! Retry with exponential back-off and jitter for Source Feed calls.

use std::future::Future;
use std::time::Duration;

use crate::error::FeedError;

const MAX_DELAY_MS: u64 = 60_000;

/// Network failures, 429s and 5xx responses are worth another attempt.
/// Bad bodies and other statuses are not.
pub(crate) fn is_retriable(err: &FeedError) -> bool {
    match err {
        FeedError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FeedError::RateLimited { .. } => true,
        FeedError::UnexpectedStatus { status, .. } => *status >= 500,
        FeedError::Deserialize { .. } | FeedError::NotConfigured => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// retriable errors. The n-th retry waits `backoff_base_ms × 2^(n-1)`
/// ±25 %, capped at 60 s. A rate-limit response waits at least its
/// `Retry-After`, under the same cap.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let jittered = (computed.min(MAX_DELAY_MS) as f64
                    * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                let delay_ms = match &err {
                    FeedError::RateLimited { retry_after_secs } => jittered
                        .max(retry_after_secs.saturating_mul(1_000))
                        .min(MAX_DELAY_MS),
                    _ => jittered,
                };
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "source feed transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
