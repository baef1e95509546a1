//! The six request types the bus dispatches.
//!
//! Commands are side-effecting; queries are read-only. Each request carries
//! its own `kind()` tag so the bus can route it without runtime type
//! introspection.

use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    CreateWallet,
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Clone)]
pub struct CreateWalletCommand {
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct DepositCommand {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Clone)]
pub struct WithdrawCommand {
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub source_wallet_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount: Decimal,
    pub reference_id: String,
}

#[derive(Debug, Clone)]
pub enum WalletCommand {
    CreateWallet(CreateWalletCommand),
    Deposit(DepositCommand),
    Withdraw(WithdrawCommand),
    Transfer(TransferCommand),
}

impl WalletCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            WalletCommand::CreateWallet(_) => CommandKind::CreateWallet,
            WalletCommand::Deposit(_) => CommandKind::Deposit,
            WalletCommand::Withdraw(_) => CommandKind::Withdraw,
            WalletCommand::Transfer(_) => CommandKind::Transfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKind {
    GetWallet,
    GetHistoricalBalance,
}

#[derive(Debug, Clone)]
pub struct GetWalletQuery {
    pub wallet_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct GetHistoricalBalanceQuery {
    pub wallet_id: Uuid,
    pub as_of: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub enum WalletQuery {
    GetWallet(GetWalletQuery),
    GetHistoricalBalance(GetHistoricalBalanceQuery),
}

impl WalletQuery {
    pub fn kind(&self) -> QueryKind {
        match self {
            WalletQuery::GetWallet(_) => QueryKind::GetWallet,
            WalletQuery::GetHistoricalBalance(_) => QueryKind::GetHistoricalBalance,
        }
    }
}
