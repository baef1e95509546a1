//! Domain model shared by every crate in the wallet service: the `Wallet`,
//! `Transaction` and `OutboxEvent` entities, the domain events they emit,
//! and the canonical `WalletError` taxonomy.
//!
//! Nothing in this crate touches IO. Repositories, caches and transports
//! depend on these types; they never depend on those crates.

pub mod error;
pub mod events;
pub mod outbox;
pub mod transaction;
pub mod wallet;

pub use error::{DegradationCode, WalletError};
pub use events::WalletEvent;
pub use outbox::OutboxEvent;
pub use transaction::{NewTransaction, Transaction, TransactionStatus, TransactionType};
pub use wallet::{Wallet, WalletStatus};
