use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events emitted on the outbox for every accepted mutation.
///
/// Each variant is self-contained (carries every field a downstream
/// consumer needs) and past-tense named. `event_type()` and `wallet_id()`
/// are what the outbox row and the event-log partition key are derived
/// from, respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum WalletEvent {
    #[serde(rename = "WALLET_CREATED")]
    WalletCreated {
        wallet_id: Uuid,
        user_id: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "FUNDS_DEPOSITED")]
    FundsDeposited {
        wallet_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        new_balance: Decimal,
        reference_id: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "FUNDS_WITHDRAWN")]
    FundsWithdrawn {
        wallet_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        new_balance: Decimal,
        reference_id: String,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "FUNDS_TRANSFERRED")]
    FundsTransferred {
        source_wallet_id: Uuid,
        destination_wallet_id: Uuid,
        source_transaction_id: Uuid,
        destination_transaction_id: Uuid,
        amount: Decimal,
        reference_id: String,
        created_at: DateTime<Utc>,
    },
}

impl WalletEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            WalletEvent::WalletCreated { .. } => "WALLET_CREATED",
            WalletEvent::FundsDeposited { .. } => "FUNDS_DEPOSITED",
            WalletEvent::FundsWithdrawn { .. } => "FUNDS_WITHDRAWN",
            WalletEvent::FundsTransferred { .. } => "FUNDS_TRANSFERRED",
        }
    }

    /// Aggregate id used as the outbox row's `aggregate_id` and the event
    /// log's partition key. Transfers partition on the source wallet so
    /// per-wallet ordering on the debit side is preserved; the destination
    /// side's ordering is preserved independently by its own outbox row
    /// (see `wallet-engine::handlers::transfer`).
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            WalletEvent::WalletCreated { wallet_id, .. } => *wallet_id,
            WalletEvent::FundsDeposited { wallet_id, .. } => *wallet_id,
            WalletEvent::FundsWithdrawn { wallet_id, .. } => *wallet_id,
            WalletEvent::FundsTransferred {
                source_wallet_id, ..
            } => *source_wallet_id,
        }
    }
}
