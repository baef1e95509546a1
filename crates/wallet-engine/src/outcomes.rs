//! Success values returned by the bus.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use wallet_schemas::WalletStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    WalletCreated {
        wallet_id: Uuid,
    },
    TransactionRecorded {
        transaction_id: Uuid,
    },
    TransferRecorded {
        source_transaction_id: Uuid,
        destination_transaction_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletView {
    pub id: Uuid,
    pub user_id: String,
    pub balance: Decimal,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalBalanceView {
    pub wallet_id: Uuid,
    pub balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Wallet(WalletView),
    HistoricalBalance(HistoricalBalanceView),
}
