//! Retry policies for the two retryable error classes.
//!
//! Two independently configured policies exist: an *optimistic-lock* policy
//! for write-handler version conflicts on a hot wallet, and a
//! *transient-failure* policy for connection/timeout/replication-lag classes
//! on both reads and writes. Neither policy ever retries `ValidationError`,
//! `WalletNotFound`, `InsufficientFunds`, `InvalidTransfer` or
//! `WalletStatusViolation` - the `is_retryable`
//! predicate passed in by the caller is what enforces that boundary.

use std::future::Future;
use std::time::Duration;
use wallet_schemas::{DegradationCode, WalletError};

/// Bounded-attempt, randomized exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Backoff for the attempt that just failed (0-indexed): `initial *
    /// 2^attempt`, jittered uniformly in `[0.5x, 1.5x)` so a herd of
    /// contending writers on the same hot wallet does not retry in lockstep.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let base_ms = (self.initial_backoff.as_millis() as u64).saturating_mul(1u64 << shift);
        let jitter = rand::random::<f64>() + 0.5; // [0.5, 1.5)
        Duration::from_millis(((base_ms as f64) * jitter) as u64)
    }
}

/// Which named policy a retry loop ran under, recorded alongside the
/// operation and exception type on every retry metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicyKind {
    OptimisticLock,
    Transient,
}

impl RetryPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryPolicyKind::OptimisticLock => "optimistic_lock",
            RetryPolicyKind::Transient => "transient",
        }
    }
}

/// Run `op` under `policy`, retrying while `is_retryable` holds and attempts
/// remain. `on_attempt` is invoked once per *retried* failure (not the final
/// one) so the caller can bump a per-(operation, policy, exception_type)
/// counter.
///
/// On exhaustion of a retryable error, the original error is logged at
/// `error` level and the loop surfaces a `WalletError::ServiceDegraded`
/// tagged with the operation; a non-retryable error is returned immediately,
/// untouched, on the very first attempt.
pub async fn run_with_retry<T, F, Fut>(
    operation: &str,
    kind: RetryPolicyKind,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&WalletError) -> bool,
    mut on_attempt: impl FnMut(u32, &WalletError),
    mut op: F,
) -> Result<T, WalletError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) if attempt + 1 < policy.max_attempts => {
                on_attempt(attempt, &e);
                tracing::warn!(
                    operation,
                    policy = kind.as_str(),
                    attempt,
                    error = %e,
                    "retrying after retryable error"
                );
                tokio::time::sleep(policy.backoff_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    operation,
                    policy = kind.as_str(),
                    attempts = attempt + 1,
                    error = %e,
                    "retry budget exhausted"
                );
                return Err(WalletError::ServiceDegraded {
                    code: DegradationCode::RateLimited,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_is_ok() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<u32, WalletError> = run_with_retry(
            "deposit",
            RetryPolicyKind::OptimisticLock,
            &policy,
            WalletError::is_optimistic_lock_retryable,
            |_, _| {},
            || async { Ok(7) },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_retryable_error_until_success() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let attempts = AtomicU32::new(0);
        let result: Result<u32, WalletError> = run_with_retry(
            "withdraw",
            RetryPolicyKind::OptimisticLock,
            &policy,
            WalletError::is_optimistic_lock_retryable,
            |_, _| {},
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(WalletError::OptimisticLock {
                        wallet_id: "w1".into(),
                    })
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_a_non_retryable_error() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let attempts = AtomicU32::new(0);
        let result: Result<u32, WalletError> = run_with_retry(
            "withdraw",
            RetryPolicyKind::Transient,
            &policy,
            WalletError::is_transient_retryable,
            |_, _| {},
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(WalletError::InsufficientFunds {
                    available: rust_decimal::Decimal::ZERO,
                    requested: rust_decimal::Decimal::ONE,
                })
            },
        )
        .await;
        assert!(matches!(result, Err(WalletError::InsufficientFunds { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_service_degraded() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<u32, WalletError> = run_with_retry(
            "deposit",
            RetryPolicyKind::OptimisticLock,
            &policy,
            WalletError::is_optimistic_lock_retryable,
            |_, _| {},
            || async {
                Err(WalletError::OptimisticLock {
                    wallet_id: "w1".into(),
                })
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(WalletError::ServiceDegraded {
                code: DegradationCode::RateLimited
            })
        ));
    }
}
