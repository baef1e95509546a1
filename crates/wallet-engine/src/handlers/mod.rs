//! One handler per request kind, each implementing
//! [`crate::bus::CommandHandler`] or [`crate::bus::QueryHandler`] and
//! generic over the ports it actually needs - a read-only query handler is
//! never generic over `PrimaryStore`, and `CreateWalletHandler` needs no
//! cache at all.

mod cache_support;
mod validation;

mod create_wallet;
mod deposit;
mod get_historical_balance;
mod get_wallet;
mod transfer;
mod withdraw;

pub use create_wallet::CreateWalletHandler;
pub use deposit::DepositHandler;
pub use get_historical_balance::GetHistoricalBalanceHandler;
pub use get_wallet::GetWalletHandler;
pub use transfer::TransferHandler;
pub use withdraw::WithdrawHandler;
