//! The wallet state engine: the command/query bus, the request and outcome
//! types it dispatches, the persistence ports it is generic over, and the
//! six handlers that implement the wallet service's write and read rules.
//!
//! This crate has no opinion on *how* a wallet is stored, cached or
//! published - it only knows the [`ports`] traits. `wallet-daemon` binds
//! them to Postgres/Redis/Kafka; `wallet-testkit` binds them to in-memory
//! fakes for tests.

pub mod bus;
pub mod handlers;
pub mod health_monitor;
pub mod outbox;
pub mod outcomes;
pub mod ports;
pub mod requests;

pub use bus::{BusError, CommandBus, CommandHandler, DispatchError, QueryBus, QueryHandler};
pub use health_monitor::{HealthMonitorConfig, PrimaryHealthMonitor};
pub use outbox::{OutboxPublisher, PublisherConfig};
pub use outcomes::{CommandOutcome, HistoricalBalanceView, QueryOutcome, WalletView};
pub use ports::{OutboxStore, PrimaryHealthProbe, PrimaryStore, ReplicaStore, WalletUnitOfWork};
pub use requests::{
    CommandKind, CreateWalletCommand, DepositCommand, GetHistoricalBalanceQuery, GetWalletQuery,
    QueryKind, TransferCommand, WalletCommand, WalletQuery, WithdrawCommand,
};
