//! Persistence ports consumed by the wallet state engine.
//!
//! These traits are explicit interfaces for each port, replacing a
//! reflective, container-managed dependency graph with constructor
//! injection: a handler is generic over
//! `S: PrimaryStore` and `R: ReplicaStore`, and the concrete binding
//! (Postgres in `wallet-db`, in-memory in `wallet-testkit`) is chosen once,
//! at composition time, in `wallet-daemon` or a test.
//!
//! [`PrimaryStore::Uow`] models one open unit of work:
//! every write handler begins one, performs its reads/writes against it, and
//! either commits it or lets it drop (rollback) on an early `?` return.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use uuid::Uuid;
use wallet_schemas::{NewTransaction, Transaction, Wallet};

/// One open unit of work against the primary store. All methods take `&mut
/// self` because a single underlying transaction handle is not safe to use
/// concurrently.
pub trait WalletUnitOfWork: Send {
    /// Load a wallet for update, locking its row (or equivalent) so
    /// concurrent writers to the same wallet serialize on it. `None` if the
    /// wallet does not exist.
    fn load_for_update(&mut self, wallet_id: Uuid) -> impl Future<Output = anyhow::Result<Option<Wallet>>> + Send;

    /// Load multiple wallets for update. Implementations must lock rows in
    /// ascending wallet-id order to avoid deadlock cycles between concurrent
    /// transfers.
    fn load_many_for_update_ordered(
        &mut self,
        wallet_ids: Vec<Uuid>,
    ) -> impl Future<Output = anyhow::Result<Vec<Wallet>>> + Send;

    /// Insert a brand-new wallet row.
    fn insert_wallet(&mut self, wallet: &Wallet) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Persist a wallet's mutated balance/status/version/updated_at,
    /// re-checking `expected_version`. Returns `false` on a lost-update race
    /// (the caller maps this to `WalletError::OptimisticLock`).
    fn persist_mutation(
        &mut self,
        wallet: &Wallet,
        expected_version: i64,
    ) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Insert a transaction row. Returns `Ok(None)` (not an error) when
    /// `(wallet_id, reference_id)` already exists, so the caller can re-read
    /// and reply with the prior transaction id.
    fn insert_transaction(
        &mut self,
        new_txn: &NewTransaction,
    ) -> impl Future<Output = anyhow::Result<Option<Uuid>>> + Send;

    /// Look up the transaction previously recorded for
    /// `(wallet_id, reference_id)`, used to serve an idempotent replay.
    fn find_transaction_by_reference(
        &mut self,
        wallet_id: Uuid,
        reference_id: &str,
    ) -> impl Future<Output = anyhow::Result<Option<Transaction>>> + Send;

    /// Look up the transaction previously recorded for `(wallet_id,
    /// correlation_id)`. Used to replay a transfer's destination leg, whose
    /// `reference_id` is not itself required to be unique to that wallet -
    /// only the source leg's `(wallet_id, reference_id)` enforces
    /// idempotency.
    fn find_transaction_by_correlation(
        &mut self,
        wallet_id: Uuid,
        correlation_id: Uuid,
    ) -> impl Future<Output = anyhow::Result<Option<Transaction>>> + Send;

    /// Insert an outbox row using this same unit of work, so it is visible
    /// if and only if the domain mutation it describes commits alongside it
    ///.
    fn store_outbox_event(
        &mut self,
        aggregate_id: Uuid,
        event_type: &str,
        payload: Value,
    ) -> impl Future<Output = anyhow::Result<i64>> + Send;
}

/// The write-path port: begins and commits units of work against the
/// primary database.
pub trait PrimaryStore: Send + Sync {
    type Uow: WalletUnitOfWork;

    fn begin(&self) -> impl Future<Output = anyhow::Result<Self::Uow>> + Send;

    /// Commit `uow`. Dropping `uow` without calling this rolls back.
    fn commit(&self, uow: Self::Uow) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The read-path port: the replica repository and the historical-balance
/// fold's transaction source.
pub trait ReplicaStore: Send + Sync {
    fn find_wallet(&self, wallet_id: Uuid) -> impl Future<Output = anyhow::Result<Option<Wallet>>> + Send;

    /// All `COMPLETED` rows for `wallet_id` with `created_at <= as_of`,
    /// ordered ascending by `(created_at, id)`.
    fn completed_transactions_up_to(
        &self,
        wallet_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<Vec<Transaction>>> + Send;

    fn ping(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Lightweight connectivity probe for the primary database, consumed by the
/// primary-health monitor. Kept separate from [`PrimaryStore`] so a monitor can be
/// built against just a ping, without requiring a full unit-of-work binding.
pub trait PrimaryHealthProbe: Send + Sync {
    fn ping(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The outbox publisher's claim/ack port. Distinct from
/// [`WalletUnitOfWork::store_outbox_event`], which writes a row inside a
/// domain mutation's own transaction: this port only ever touches rows
/// after they are already durable.
pub trait OutboxStore: Send + Sync {
    /// Atomically claim up to `batch_size` unpublished rows for exclusive
    /// dispatch by `publisher_id`. Implementations must make concurrent
    /// publishers safe to run against the same store without double-claiming
    /// a row.
    fn claim_batch(
        &self,
        batch_size: i64,
        publisher_id: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<wallet_schemas::OutboxEvent>>> + Send;

    /// Mark a claimed row published. Returns `false` if the row was not
    /// found (already published, or never claimed by this store).
    fn mark_published(&self, outbox_id: i64) -> impl Future<Output = anyhow::Result<bool>> + Send;

    /// Record a failed publish attempt and release the claim so the next
    /// polling cycle retries the row.
    fn mark_failed(&self, outbox_id: i64) -> impl Future<Output = anyhow::Result<bool>> + Send;
}
