//! Bounded retries around the model call.
//!
//! The wrapped call is opaque: all the [`Requester`] sees is whether it
//! succeeded and, if not, the text of the error. That text decides whether
//! another attempt is worth making (see [`classify`]).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

const RETRYABLE_MARKERS: [&str; 9] = [
    "timeout",
    "connection",
    "network",
    "rate limit",
    "quota exceeded",
    "service unavailable",
    "internal server error",
    "bad gateway",
    "gateway timeout",
];

const NON_RETRYABLE_MARKERS: [&str; 5] = [
    "authentication",
    "unauthorized",
    "invalid api key",
    "forbidden",
    "access denied",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// Classify a failure by the markers in its lower-cased text.
///
/// Retryable markers win over non-retryable ones; text matching neither is
/// treated as retryable.
///
/// ```
/// use triage_core::request::{classify, ErrorClass};
///
/// assert_eq!(classify("HTTP 503: Service Unavailable"), ErrorClass::Retryable);
/// assert_eq!(classify("Invalid API key"), ErrorClass::NonRetryable);
/// assert_eq!(classify("something odd"), ErrorClass::Retryable);
/// ```
pub fn classify(error: &str) -> ErrorClass {
    let lowered = error.to_lowercase();
    if RETRYABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ErrorClass::Retryable;
    }
    if NON_RETRYABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ErrorClass::NonRetryable;
    }
    ErrorClass::Retryable
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Wait before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// One retry the requester performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRecord {
    /// Attempt number the retry led to (the first attempt is 1).
    pub attempt: u32,
    pub delay: Duration,
    /// Error from the attempt before it.
    pub error: String,
}

#[derive(Debug)]
pub struct Requested<T> {
    pub output: T,
    pub retries: Vec<RetryRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("request interrupted")]
    Interrupted,
    #[error("request failed and will not be retried: {error}")]
    NonRetryable { error: String, retries: Vec<RetryRecord> },
    #[error("all {attempts} attempts failed; last error: {last_error}")]
    AllAttemptsFailed {
        attempts: u32,
        last_error: String,
        retries: Vec<RetryRecord>,
    },
}

impl RequestError {
    /// Error text of the failure that ended the request, if any.
    pub fn last_error(&self) -> Option<&str> {
        match self {
            Self::Interrupted => None,
            Self::NonRetryable { error, .. } => Some(error),
            Self::AllAttemptsFailed { last_error, .. } => Some(last_error),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Requester {
    policy: RetryPolicy,
}

impl Requester {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive `call` until it succeeds, fails for good, or `cancel` fires.
    ///
    /// Both the backoff wait and the call itself are raced against `cancel`;
    /// once it fires no further attempt is made.
    pub async fn request<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<Requested<T>, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts();
        let mut retries: Vec<RetryRecord> = Vec::new();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay_for(attempt - 1);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "request.retrying"
                );
                retries.push(RetryRecord {
                    attempt,
                    delay,
                    error: last_error.clone(),
                });

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RequestError::Interrupted),
                    _ = tokio::time::sleep(delay) => {}
                }
            } else if cancel.is_cancelled() {
                return Err(RequestError::Interrupted);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RequestError::Interrupted),
                result = call() => result,
            };

            match result {
                Ok(output) => {
                    if !retries.is_empty() {
                        tracing::info!(attempt, "request.recovered");
                    }
                    return Ok(Requested { output, retries });
                }
                Err(err) => {
                    let error = err.to_string();
                    if classify(&error) == ErrorClass::NonRetryable {
                        tracing::error!(attempt, error = %error, "request.non_retryable");
                        return Err(RequestError::NonRetryable { error, retries });
                    }
                    tracing::debug!(attempt, error = %error, "request.attempt_failed");
                    last_error = error;
                }
            }
        }

        tracing::error!(attempts = max_attempts, error = %last_error, "request.exhausted");
        Err(RequestError::AllAttemptsFailed {
            attempts: max_attempts,
            last_error,
            retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn retryable_markers_are_checked_first() {
        assert_eq!(classify("Gateway Timeout"), ErrorClass::Retryable);
        assert_eq!(
            classify("unauthorized: connection reset"),
            ErrorClass::Retryable
        );
        assert_eq!(classify("403 Forbidden"), ErrorClass::NonRetryable);
        assert_eq!(
            classify("Authentication failed for project"),
            ErrorClass::NonRetryable
        );
        assert_eq!(classify("rate limit exceeded (429)"), ErrorClass::Retryable);
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let requester = Requester::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let started = Instant::now();

        let out = requester
            .request(&cancel, || {
                calls += 1;
                let n = calls;
                async move {
                    if n <= 2 {
                        Err("connection timeout")
                    } else {
                        Ok("{\"specialist\":\"ENT\"}")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(out.output, "{\"specialist\":\"ENT\"}");
        assert_eq!(out.retries.len(), 2);
        assert_eq!(out.retries[0].delay, Duration::from_secs(1));
        assert_eq!(out.retries[1].delay, Duration::from_secs(2));
        assert_eq!(out.retries[1].attempt, 3);
        assert_eq!(out.retries[0].error, "connection timeout");
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_key_aborts_without_retrying() {
        let requester = Requester::default();
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let err = requester
            .request(&cancel, || {
                calls += 1;
                async { Err::<(), _>("invalid api key") }
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 1);
        match err {
            RequestError::NonRetryable { error, retries } => {
                assert_eq!(error, "invalid api key");
                assert!(retries.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_reports_last_error() {
        let requester = Requester::new(RetryPolicy::new(2, Duration::from_millis(10)));
        let cancel = CancellationToken::new();
        let mut calls = 0;

        let err = requester
            .request(&cancel, || {
                calls += 1;
                let n = calls;
                async move { Err::<(), _>(format!("service unavailable #{n}")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 3);
        assert_eq!(err.last_error(), Some("service unavailable #3"));
        assert!(matches!(
            err,
            RequestError::AllAttemptsFailed { attempts: 3, ref retries, .. } if retries.len() == 2
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_backoff_stops_further_calls() {
        let requester = Requester::default();
        let cancel = CancellationToken::new();
        let trip = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trip.cancel();
        });

        let mut calls = 0;
        let err = requester
            .request(&cancel, || {
                calls += 1;
                async { Err::<(), _>("network unreachable") }
            })
            .await
            .unwrap_err();

        assert_eq!(err, RequestError::Interrupted);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_call_is_not_swallowed() {
        let requester = Requester::default();
        let cancel = CancellationToken::new();
        let trip = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trip.cancel();
        });

        let err = requester
            .request(&cancel, || std::future::pending::<Result<(), String>>())
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Interrupted);
    }

    #[tokio::test]
    async fn already_cancelled_makes_no_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        let err = Requester::default()
            .request(&cancel, || {
                calls += 1;
                async { Ok::<_, String>(()) }
            })
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::Interrupted);
        assert_eq!(calls, 0);
    }
}
