use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of balance change a [`Transaction`] row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::TransferIn => "TRANSFER_IN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(TransactionType::Deposit),
            "WITHDRAWAL" => Some(TransactionType::Withdrawal),
            "TRANSFER_OUT" => Some(TransactionType::TransferOut),
            "TRANSFER_IN" => Some(TransactionType::TransferIn),
            _ => None,
        }
    }

    /// Sign applied to `amount` when folding a historical balance.
    /// DEPOSIT/TRANSFER_IN credit; WITHDRAWAL/TRANSFER_OUT debit.
    pub fn fold_sign(&self) -> i64 {
        match self {
            TransactionType::Deposit | TransactionType::TransferIn => 1,
            TransactionType::Withdrawal | TransactionType::TransferOut => -1,
        }
    }
}

/// Only `Completed` rows affect balance; `Rejected` rows are kept for audit
/// but never folded into the historical balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Completed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(TransactionStatus::Completed),
            "REJECTED" => Some(TransactionStatus::Rejected),
            _ => None,
        }
    }
}

/// A durable, immutable record of a single balance change.
///
/// For a transfer, two rows are written - one per side - sharing
/// `correlation_id`, so the historical fold (see `wallet-engine`) can treat
/// every wallet's ledger symmetrically regardless of which side of a
/// transfer it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub reference_id: String,
    pub counterparty_wallet_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// A transaction row awaiting insertion.
///
/// The caller assigns `id` (so it can reference it in the same outbox event
/// payload before commit); a backing store assigns `created_at` at insert
/// time unless `created_at_override` is set, which exists only so tests can
/// construct deterministic historical-fold fixtures.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub reference_id: String,
    pub counterparty_wallet_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at_override: Option<DateTime<Utc>>,
}
