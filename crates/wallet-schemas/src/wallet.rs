use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a wallet. Transitions are monotone: ACTIVE -> FROZEN
/// -> CLOSED. Only ACTIVE wallets accept mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    Active,
    Frozen,
    Closed,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "ACTIVE",
            WalletStatus::Frozen => "FROZEN",
            WalletStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(WalletStatus::Active),
            "FROZEN" => Some(WalletStatus::Frozen),
            "CLOSED" => Some(WalletStatus::Closed),
            _ => None,
        }
    }

    /// `true` if the status permits deposit/withdraw/transfer mutation.
    pub fn permits_mutation(&self) -> bool {
        matches!(self, WalletStatus::Active)
    }

    /// Whether moving from `self` to `next` respects the monotone
    /// ACTIVE -> FROZEN -> CLOSED ordering (or is a no-op).
    pub fn can_transition_to(&self, next: WalletStatus) -> bool {
        use WalletStatus::*;
        matches!(
            (self, next),
            (Active, Active)
                | (Active, Frozen)
                | (Active, Closed)
                | (Frozen, Frozen)
                | (Frozen, Closed)
                | (Closed, Closed)
        )
    }
}

/// An account holding a non-negative monetary balance for one owner.
///
/// `version` is the optimistic-concurrency token: every persisted mutation
/// must bump it by exactly one, and any write whose precondition no longer
/// matches the stored version is rejected as `WalletError::OptimisticLock`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: String,
    pub balance: Decimal,
    pub status: WalletStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Construct a brand-new wallet: balance zero, ACTIVE, version 1.
    pub fn new(id: Uuid, user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            balance: Decimal::ZERO,
            status: WalletStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// `true` if the wallet's balance invariant (>= 0) holds.
    pub fn balance_is_valid(&self) -> bool {
        self.balance >= Decimal::ZERO
    }
}
