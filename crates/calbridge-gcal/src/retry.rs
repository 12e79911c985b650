//! Retry policy for transient remote failures.
//!
//! Rate limiting and server-side errors (HTTP 429 and 5xx) are retried
//! with exponential backoff: 1s, 2s, 4s, 8s between attempts, at most
//! [`MAX_ATTEMPTS`] attempts total. The final failure is returned as-is
//! with no trailing sleep. Everything else (auth, not-found, validation,
//! network transport errors) is returned immediately so the caller's own
//! handling can kick in.

use std::future::Future;
use std::time::Duration;

use crate::error::GcalResult;

/// Maximum number of attempts for a retryable operation.
pub const MAX_ATTEMPTS: u32 = 5;

const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Computes the backoff delay before the attempt following `attempt`
/// (1-based). Doubles from [`BASE_DELAY`] and caps at [`MAX_DELAY`].
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(31);
    BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or exhausts [`MAX_ATTEMPTS`].
pub async fn with_backoff<T, F, Fut>(mut operation: F) -> GcalResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GcalResult<T>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "transient remote failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GcalError, GcalErrorCode};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(5), Duration::from_secs(8));
        assert_eq!(backoff_delay(10), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_rate_limits() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = with_backoff(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(GcalError::rate_limited("rate limit exceeded"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two failures pause 1s then 2s before the third attempt.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_on_persistent_server_errors() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: GcalResult<()> = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GcalError::server("API error (500): boom")) }
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.code(), GcalErrorCode::Server);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        // Four pauses (1 + 2 + 4 + 8) and no sleep after the final failure.
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: GcalResult<()> = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GcalError::not_found("calendar not found")) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), GcalErrorCode::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: GcalResult<()> = with_backoff(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GcalError::network("connection failed: refused")) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), GcalErrorCode::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
