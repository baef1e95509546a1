//! In-memory fakes for every port in `wallet-engine`, so handlers, the
//! outbox publisher, and a daemon composition root can all be driven by a
//! test without live Postgres, Redis or Kafka.
//!
//! Each fake implements the same trait a production adapter does
//! (`wallet_engine::ports::{PrimaryStore, ReplicaStore, OutboxStore}`,
//! `wallet_cache::CachePort`, `wallet_eventlog::EventLogPort`) and nothing
//! more - a test wiring one of these in place of its production
//! counterpart should not need to know it is a fake.

mod cache;
mod eventlog;
mod store;

pub use cache::InMemoryCache;
pub use eventlog::{AppendedEvent, InMemoryEventLog};
pub use store::{InMemoryStore, InMemoryUow};
