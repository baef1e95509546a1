use rust_decimal::Decimal;
use std::fmt;

/// The canonical error taxonomy raised by wallet-engine handlers and
/// understood by the resilience layer and any transport adapter.
///
/// Each variant carries a stable machine-readable `code()` so a transport
/// adapter can map it to a status family without matching on `Display` text.
/// `DuplicateReference` is only ever observed internally by a handler - it is
/// translated to an idempotent success before it reaches a bus caller.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletError {
    /// Malformed input: non-positive amount, empty reference_id, malformed id.
    Validation { message: String },
    /// The target wallet does not exist.
    WalletNotFound { wallet_id: String },
    /// A debit would make balance negative.
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
    /// Transfer-specific violation (same source/destination, bad amount).
    InvalidTransfer { message: String },
    /// Target wallet is not ACTIVE.
    WalletStatusViolation { wallet_id: String, status: String },
    /// Version mismatch on persist. Retryable by the optimistic-lock policy.
    OptimisticLock { wallet_id: String },
    /// Connection/timeout/replication-lag class. Retryable by the transient policy.
    Transient { message: String },
    /// A degradation flag is currently blocking the request.
    ServiceDegraded { code: DegradationCode },
    /// Observed only inside a handler; never returned to a bus caller.
    DuplicateReference { transaction_id: String },
    /// Anything else. Logged at error, opaque to external callers.
    Internal { message: String },
}

/// The sub-codes carried by `WalletError::ServiceDegraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationCode {
    ReadOnlyMode,
    CacheBypass,
    EventProcessingDegraded,
    RateLimited,
}

impl DegradationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationCode::ReadOnlyMode => "READ_ONLY_MODE",
            DegradationCode::CacheBypass => "CACHE_BYPASS",
            DegradationCode::EventProcessingDegraded => "EVENT_PROCESSING_DEGRADED",
            DegradationCode::RateLimited => "RATE_LIMITED",
        }
    }
}

impl WalletError {
    /// Stable machine-readable error code, independent of the `Display` text.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::Validation { .. } => "VALIDATION_ERROR",
            WalletError::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            WalletError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            WalletError::InvalidTransfer { .. } => "INVALID_TRANSFER",
            WalletError::WalletStatusViolation { .. } => "WALLET_STATUS_VIOLATION",
            WalletError::OptimisticLock { .. } => "OPTIMISTIC_LOCK",
            WalletError::Transient { .. } => "TRANSIENT",
            WalletError::ServiceDegraded { .. } => "SERVICE_DEGRADED",
            WalletError::DuplicateReference { .. } => "DUPLICATE_REFERENCE",
            WalletError::Internal { .. } => "INTERNAL",
        }
    }

    /// `true` for errors the resilience layer's optimistic-lock retry policy
    /// may retry.
    pub fn is_optimistic_lock_retryable(&self) -> bool {
        matches!(self, WalletError::OptimisticLock { .. })
    }

    /// `true` for errors the resilience layer's transient-failure retry
    /// policy may retry. Validation, not-found, insufficient-funds, invalid
    /// transfer and status violations are never retried.
    pub fn is_transient_retryable(&self) -> bool {
        matches!(self, WalletError::Transient { .. })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WalletError::Validation {
            message: message.into(),
        }
    }

    pub fn wallet_not_found(wallet_id: impl Into<String>) -> Self {
        WalletError::WalletNotFound {
            wallet_id: wallet_id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        WalletError::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::Validation { message } => write!(f, "validation error: {message}"),
            WalletError::WalletNotFound { wallet_id } => {
                write!(f, "wallet not found: {wallet_id}")
            }
            WalletError::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "insufficient funds: available={available} requested={requested}"
            ),
            WalletError::InvalidTransfer { message } => write!(f, "invalid transfer: {message}"),
            WalletError::WalletStatusViolation { wallet_id, status } => write!(
                f,
                "wallet {wallet_id} is {status}, mutation requires ACTIVE"
            ),
            WalletError::OptimisticLock { wallet_id } => {
                write!(f, "optimistic lock conflict on wallet {wallet_id}")
            }
            WalletError::Transient { message } => write!(f, "transient failure: {message}"),
            WalletError::ServiceDegraded { code } => {
                write!(f, "service degraded: {}", code.as_str())
            }
            WalletError::DuplicateReference { transaction_id } => {
                write!(f, "duplicate reference, existing transaction {transaction_id}")
            }
            WalletError::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for WalletError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_lock_is_retryable_only_by_its_own_policy() {
        let e = WalletError::OptimisticLock {
            wallet_id: "w1".into(),
        };
        assert!(e.is_optimistic_lock_retryable());
        assert!(!e.is_transient_retryable());
    }

    #[test]
    fn validation_errors_are_never_retryable() {
        let e = WalletError::validation("bad amount");
        assert!(!e.is_optimistic_lock_retryable());
        assert!(!e.is_transient_retryable());
    }

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(WalletError::wallet_not_found("w1").code(), "WALLET_NOT_FOUND");
        assert_eq!(
            WalletError::ServiceDegraded {
                code: DegradationCode::ReadOnlyMode
            }
            .code(),
            "SERVICE_DEGRADED"
        );
    }
}
