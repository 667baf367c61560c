//! Fixed-interval retry of cloud API calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::client::{ApiError, HTTP_STATUS_CODE_ERROR, NETWORK_ERROR};
use crate::error::ProviderError;

/// Upper bound for retrying read-only calls.
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Upper bound for retrying mutating calls.
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Pause between two attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Codes treated as transient by every call.
pub const RETRYABLE_ERROR_CODES: &[&str] = &[
    NETWORK_ERROR,
    HTTP_STATUS_CODE_ERROR,
    "FailedOperation",
    "InternalError",
    "TradeUnknownError",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceInsufficient",
    "ResourceUnavailable",
    "ResourceBusy",
];

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum RetryError {
    /// Try again after the interval.
    Transient(ProviderError),
    /// Give up immediately.
    Permanent(ProviderError),
}

impl RetryError {
    pub fn transient(err: impl Into<ProviderError>) -> Self {
        Self::Transient(err.into())
    }

    pub fn permanent(err: impl Into<ProviderError>) -> Self {
        Self::Permanent(err.into())
    }
}

impl From<ApiError> for RetryError {
    fn from(err: ApiError) -> Self {
        retry_error(err, &[])
    }
}

fn is_retryable_code(code: &str, extra: &[&str]) -> bool {
    let short = code.split('.').next().unwrap_or(code);
    RETRYABLE_ERROR_CODES
        .iter()
        .chain(extra.iter())
        .any(|c| *c == code || *c == short)
}

/// Classify an API error, treating `extra` codes as transient too.
pub fn retry_error(err: ApiError, extra: &[&str]) -> RetryError {
    if is_retryable_code(&err.code, extra) {
        RetryError::Transient(err.into())
    } else {
        RetryError::Permanent(err.into())
    }
}

/// Timing of a retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_timeout: READ_RETRY_TIMEOUT,
            write_timeout: WRITE_RETRY_TIMEOUT,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or `timeout` elapses.
///
/// On timeout the last transient error is reported as `DeadlineExceeded`.
pub async fn retry<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(err)) => return Err(err),
            Err(RetryError::Transient(err)) => {
                if Instant::now() + interval > deadline {
                    return Err(ProviderError::DeadlineExceeded(format!(
                        "timeout after {:?} and {} attempts, last error: {}",
                        timeout, attempt, err
                    )));
                }
                warn!(attempt, error = %err, "transient error, retrying");
                tokio::time::sleep(interval).await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn api(code: &str) -> ApiError {
        ApiError::new(code, "test")
    }

    #[test]
    fn test_retry_error_allowlist() {
        assert!(matches!(retry_error(api("InternalError"), &[]), RetryError::Transient(_)));
        assert!(matches!(retry_error(api(NETWORK_ERROR), &[]), RetryError::Transient(_)));
        assert!(matches!(
            retry_error(api("ResourceNotFound"), &[]),
            RetryError::Permanent(_)
        ));
    }

    #[test]
    fn test_retry_error_prefix_match() {
        assert!(matches!(
            retry_error(api("FailedOperation.Busy"), &[]),
            RetryError::Transient(_)
        ));
        assert!(matches!(
            retry_error(api("ResourceInUse.Subnet"), &[]),
            RetryError::Transient(_)
        ));
        assert!(matches!(
            retry_error(api("InvalidParameterValue.Range"), &[]),
            RetryError::Permanent(_)
        ));
    }

    #[test]
    fn test_retry_error_extra_codes() {
        assert!(matches!(
            retry_error(api("UnsupportedOperation.InvalidStatus"), &["UnsupportedOperation"]),
            RetryError::Transient(_)
        ));
        assert!(matches!(
            retry_error(
                api("InvalidParameter.Coexist"),
                &["InvalidParameter.Coexist"]
            ),
            RetryError::Transient(_)
        ));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result = retry(Duration::from_secs(5), Duration::from_millis(10), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RetryError::from(api("InternalError")))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> =
            retry(Duration::from_secs(5), Duration::from_millis(10), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::from(api("AuthFailure.SecretIdNotFound")))
            })
            .await;

        assert!(matches!(result, Err(ProviderError::PermissionDenied(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_times_out_with_last_error() {
        let result: Result<(), _> =
            retry(Duration::from_millis(50), Duration::from_millis(20), || async move {
                Err(RetryError::from(api("ResourceBusy")))
            })
            .await;

        match result {
            Err(ProviderError::DeadlineExceeded(msg)) => assert!(msg.contains("ResourceBusy")),
            other => panic!("expected deadline exceeded, got {:?}", other),
        }
    }
}
