//! Bounded retry combinator.
//!
//! Each attempt reports a tagged [`AttemptOutcome`]; the combinator owns the
//! policy. Validation failures and retryable transport failures consume an
//! attempt, a non-retryable transport failure ends the loop at once, and
//! running out of attempts yields [`GenerationError::Exhausted`].

use std::future::Future;

use devgen_utils::error::{GenerationError, LlmError};
use devgen_utils::logging::{attempt_span, redact};
use tracing::Instrument;

/// Result of a single attempt
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    /// The candidate was produced but rejected; the message says why
    ValidationFailure(String),
    TransportFailure(LlmError),
}

/// How many times to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// First attempt plus `max_retries`
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Successful value plus the attempt that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    /// 1-based
    pub attempt: u32,
}

/// Run `attempt` until it succeeds, aborts, or the policy is spent.
///
/// `attempt` receives the 1-based attempt number.
pub async fn run_bounded<T, F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<Attempted<T>, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut last_failure = String::from("no attempt was made");

    for n in 1..=max_attempts {
        let outcome = attempt(n).instrument(attempt_span(n, max_attempts)).await;
        match outcome {
            AttemptOutcome::Success(value) => {
                tracing::debug!(attempt = n, "attempt succeeded");
                return Ok(Attempted { value, attempt: n });
            }
            AttemptOutcome::ValidationFailure(reason) => {
                tracing::warn!(attempt = n, max_attempts, reason = %reason, "candidate rejected");
                last_failure = reason;
            }
            AttemptOutcome::TransportFailure(error) if !error.is_retryable() => {
                tracing::error!(attempt = n, error = %redact(&error.to_string()), "non-retryable provider error");
                return Err(GenerationError::Aborted {
                    attempt: n,
                    source: error,
                });
            }
            AttemptOutcome::TransportFailure(error) => {
                let reason = redact(&error.to_string());
                tracing::warn!(attempt = n, max_attempts, error = %reason, "completion call failed");
                last_failure = reason;
            }
        }
    }

    Err(GenerationError::Exhausted {
        attempts: max_attempts,
        last_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_success_after_failures() {
        let calls = Cell::new(0);
        let result = run_bounded(RetryPolicy::new(2), |n| {
            calls.set(calls.get() + 1);
            async move {
                if n < 3 {
                    AttemptOutcome::ValidationFailure(format!("bad candidate {n}"))
                } else {
                    AttemptOutcome::Success("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "ok");
        assert_eq!(result.attempt, 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_failure() {
        let calls = Cell::new(0);
        let err = run_bounded::<(), _, _>(RetryPolicy::new(2), |n| {
            calls.set(calls.get() + 1);
            async move { AttemptOutcome::ValidationFailure(format!("reason {n}")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 3);
        match err {
            GenerationError::Exhausted {
                attempts,
                last_failure,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_failure, "reason 3");
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retryable_transport_failures_consume_attempts() {
        let calls = Cell::new(0);
        let result = run_bounded(RetryPolicy::new(1), |n| {
            calls.set(calls.get() + 1);
            async move {
                if n == 1 {
                    AttemptOutcome::TransportFailure(LlmError::ProviderOutage("503".to_string()))
                } else {
                    AttemptOutcome::Success(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result.value, 2);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_aborts_immediately() {
        let calls = Cell::new(0);
        let err = run_bounded::<(), _, _>(RetryPolicy::new(5), |_| {
            calls.set(calls.get() + 1);
            async { AttemptOutcome::TransportFailure(LlmError::ProviderAuth("401".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            err,
            GenerationError::Aborted {
                attempt: 1,
                source: LlmError::ProviderAuth(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_retries_means_one_attempt() {
        let calls = Cell::new(0);
        let err = run_bounded::<(), _, _>(RetryPolicy::new(0), |_| {
            calls.set(calls.get() + 1);
            async { AttemptOutcome::ValidationFailure("no".to_string()) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, GenerationError::Exhausted { attempts: 1, .. }));
    }
}
