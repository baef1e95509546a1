//! Postgres bindings for the `wallet-engine` ports. `wallet-db` owns the SQL; this module only
//! adapts its repositories to the trait shapes the engine is generic over.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use wallet_db::{OutboxRepository, PrimaryWalletRepository, ReplicaWalletRepository, TransactionRepository};
use wallet_engine::ports::{OutboxStore, PrimaryHealthProbe, PrimaryStore, ReplicaStore, WalletUnitOfWork};
use wallet_schemas::{NewTransaction, OutboxEvent, Transaction, Wallet};

/// One open unit of work: a live `sqlx::Transaction` plus the repositories
/// that know how to read/write through it. `PgPool::begin` hands back a
/// `'static` transaction, so this can be stored and moved across the
/// `begin`/`commit` boundary `PrimaryStore` requires.
pub struct PgUow {
    tx: sqlx::Transaction<'static, sqlx::Postgres>,
    wallets: PrimaryWalletRepository,
    transactions: TransactionRepository,
    outbox: OutboxRepository,
}

impl WalletUnitOfWork for PgUow {
    async fn load_for_update(&mut self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        self.wallets.load_for_update(&mut self.tx, wallet_id).await
    }

    async fn load_many_for_update_ordered(&mut self, wallet_ids: Vec<Uuid>) -> Result<Vec<Wallet>> {
        self.wallets
            .load_many_for_update_ordered(&mut self.tx, wallet_ids)
            .await
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<()> {
        self.wallets.insert(&mut self.tx, wallet).await
    }

    async fn persist_mutation(&mut self, wallet: &Wallet, expected_version: i64) -> Result<bool> {
        self.wallets.persist_mutation(&mut self.tx, wallet, expected_version).await
    }

    async fn insert_transaction(&mut self, new_txn: &NewTransaction) -> Result<Option<Uuid>> {
        self.transactions.insert(&mut self.tx, new_txn).await
    }

    async fn find_transaction_by_reference(
        &mut self,
        wallet_id: Uuid,
        reference_id: &str,
    ) -> Result<Option<Transaction>> {
        self.transactions
            .find_by_wallet_and_reference(&mut self.tx, wallet_id, reference_id)
            .await
    }

    async fn find_transaction_by_correlation(
        &mut self,
        wallet_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<Option<Transaction>> {
        self.transactions
            .find_by_wallet_and_correlation(&mut self.tx, wallet_id, correlation_id)
            .await
    }

    async fn store_outbox_event(&mut self, aggregate_id: Uuid, event_type: &str, payload: Value) -> Result<i64> {
        self.outbox.store(&mut self.tx, aggregate_id, event_type, payload).await
    }
}

/// The write-path [`PrimaryStore`] binding: one primary connection pool and
/// the three repositories a unit of work needs.
#[derive(Clone)]
pub struct PgPrimaryStore {
    pool: PgPool,
    wallets: PrimaryWalletRepository,
    transactions: TransactionRepository,
    outbox: OutboxRepository,
}

impl PgPrimaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: PrimaryWalletRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool.clone()),
            outbox: OutboxRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PrimaryStore for PgPrimaryStore {
    type Uow = PgUow;

    async fn begin(&self) -> Result<Self::Uow> {
        let tx = self.pool.begin().await?;
        Ok(PgUow {
            tx,
            wallets: self.wallets.clone(),
            transactions: self.transactions.clone(),
            outbox: self.outbox.clone(),
        })
    }

    async fn commit(&self, uow: Self::Uow) -> Result<()> {
        uow.tx.commit().await?;
        Ok(())
    }
}

impl PrimaryHealthProbe for PgPrimaryStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// The read-path [`ReplicaStore`] binding.
#[derive(Clone)]
pub struct PgReplicaStore {
    wallets: ReplicaWalletRepository,
    transactions: TransactionRepository,
}

impl PgReplicaStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: ReplicaWalletRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool),
        }
    }
}

impl ReplicaStore for PgReplicaStore {
    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        self.wallets.find_by_id(wallet_id).await
    }

    async fn completed_transactions_up_to(&self, wallet_id: Uuid, as_of: DateTime<Utc>) -> Result<Vec<Transaction>> {
        self.transactions.completed_up_to(wallet_id, as_of).await
    }

    async fn ping(&self) -> Result<()> {
        self.wallets.ping().await
    }
}

/// The outbox publisher's claim/ack binding, wrapping the same
/// [`OutboxRepository`] the write path uses to insert rows.
#[derive(Clone)]
pub struct PgOutboxStore(OutboxRepository);

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self(OutboxRepository::new(pool))
    }
}

impl OutboxStore for PgOutboxStore {
    async fn claim_batch(&self, batch_size: i64, publisher_id: &str) -> Result<Vec<OutboxEvent>> {
        let rows = self.0.claim_batch(batch_size, publisher_id).await?;
        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn mark_published(&self, outbox_id: i64) -> Result<bool> {
        self.0.mark_published(outbox_id).await
    }

    async fn mark_failed(&self, outbox_id: i64) -> Result<bool> {
        self.0.mark_failed(outbox_id).await
    }
}
