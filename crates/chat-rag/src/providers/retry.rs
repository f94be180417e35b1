//! Exponential backoff for idempotent upstream calls

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Outcome of one failed attempt
#[derive(Debug)]
pub(crate) enum Attempt {
    /// Worth another try (network error, 5xx, 408, 429)
    Transient(Error),
    /// Will fail the same way again (other 4xx)
    Permanent(Error),
}

impl Attempt {
    /// Classify a non-success HTTP status
    pub(crate) fn from_status(status: StatusCode, error: Error) -> Self {
        let retryable = !status.is_client_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS;

        if retryable {
            Self::Transient(error)
        } else {
            Self::Permanent(error)
        }
    }
}

impl From<Error> for Attempt {
    fn from(error: Error) -> Self {
        Self::Transient(error)
    }
}

impl From<reqwest::Error> for Attempt {
    fn from(error: reqwest::Error) -> Self {
        Self::Transient(Error::from(error))
    }
}

/// Run `operation` up to `max_retries + 1` times, sleeping 1s, 2s, 4s, ...
/// between attempts. Stops at the first permanent failure; otherwise returns
/// the last error once every attempt failed.
pub(crate) async fn with_backoff<F, Fut, T>(service: &str, max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, Attempt>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(Attempt::Permanent(e)) => {
                tracing::warn!("{} request rejected, not retrying: {}", service, e);
                return Err(e);
            }
            Err(Attempt::Transient(e)) => {
                if attempt < max_retries {
                    let delay = Duration::from_secs(2u64.saturating_pow(attempt));
                    tracing::warn!(
                        "{} request failed (attempt {}/{}), retrying in {:?}: {}",
                        service,
                        attempt + 1,
                        max_retries.saturating_add(1),
                        delay,
                        e
                    );
                    sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::internal(format!("{} request never ran", service))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", 2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Attempt::from_status(
                    StatusCode::SERVICE_UNAVAILABLE,
                    Error::llm("HTTP 503"),
                ))
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 1, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(Attempt::from(Error::llm(format!("failure {}", n))))
        })
        .await;

        assert!(matches!(result, Err(Error::Llm(msg)) if msg == "failure 1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<()> = with_backoff("test", 0, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Attempt::from(Error::llm("down")))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_backoff("test", 3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Attempt::from_status(
                StatusCode::UNAUTHORIZED,
                Error::llm("HTTP 401 - invalid api key"),
            ))
        })
        .await;

        assert!(matches!(result, Err(Error::Llm(msg)) if msg.contains("401")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_classification() {
        let classify = |status| Attempt::from_status(status, Error::llm("x"));
        assert!(matches!(classify(StatusCode::BAD_REQUEST), Attempt::Permanent(_)));
        assert!(matches!(classify(StatusCode::NOT_FOUND), Attempt::Permanent(_)));
        assert!(matches!(classify(StatusCode::TOO_MANY_REQUESTS), Attempt::Transient(_)));
        assert!(matches!(classify(StatusCode::REQUEST_TIMEOUT), Attempt::Transient(_)));
        assert!(matches!(classify(StatusCode::BAD_GATEWAY), Attempt::Transient(_)));
    }
}
