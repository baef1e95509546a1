//! An in-memory stand-in for the Postgres-backed primary/replica stores,
//! implementing [`wallet_engine::ports::PrimaryStore`],
//! [`wallet_engine::ports::WalletUnitOfWork`] and
//! [`wallet_engine::ports::ReplicaStore`] over one shared map.
//!
//! Fidelity note: a real `wallet-db` unit of work holds a Postgres row lock
//! from `load_for_update` through `commit`/rollback, so a second writer
//! targeting the same wallet blocks rather than racing. This fake does not
//! model that lock - it buffers every wallet write attempted via
//! `persist_mutation` and re-validates each one's expected version a second
//! time at `commit`, failing the whole commit (surfaced as a transient
//! error, which the outer retry policy retries) if another uow's commit won
//! the race in between. That is weaker than a real row lock but sufficient
//! for the single-task, deterministically-interleaved scenarios this crate
//! is built to drive; it is not a load-testing harness.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use wallet_engine::ports::{OutboxStore, PrimaryStore, ReplicaStore, WalletUnitOfWork};
use wallet_schemas::{NewTransaction, OutboxEvent, Transaction, Wallet};

#[derive(Default)]
struct SharedState {
    wallets: HashMap<Uuid, Wallet>,
    transactions: Vec<Transaction>,
    outbox: Vec<OutboxEvent>,
    next_outbox_id: i64,
}

/// The in-memory backing store. Primary and replica reads both hit this
/// same map - there is no replication lag to fabricate in a unit test.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<SharedState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a wallet directly, bypassing `CreateWallet`, for fixtures that
    /// need deterministic starting balances.
    pub async fn seed_wallet(&self, wallet: Wallet) {
        self.shared.lock().await.wallets.insert(wallet.id, wallet);
    }

    /// Seed a completed transaction row directly, for historical-fold fixtures.
    pub async fn seed_transaction(&self, transaction: Transaction) {
        self.shared.lock().await.transactions.push(transaction);
    }

    pub async fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.shared.lock().await.outbox.clone()
    }

    pub async fn wallet_count(&self) -> usize {
        self.shared.lock().await.wallets.len()
    }
}

pub struct InMemoryUow {
    shared: Arc<Mutex<SharedState>>,
    new_wallets: Vec<Wallet>,
    wallet_writes: Vec<(Wallet, i64)>,
    new_transactions: Vec<(Uuid, Transaction)>,
    new_outbox: Vec<(i64, Uuid, String, Value)>,
}

impl WalletUnitOfWork for InMemoryUow {
    async fn load_for_update(&mut self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        Ok(self.shared.lock().await.wallets.get(&wallet_id).cloned())
    }

    async fn load_many_for_update_ordered(&mut self, mut wallet_ids: Vec<Uuid>) -> Result<Vec<Wallet>> {
        wallet_ids.sort();
        wallet_ids.dedup();
        let shared = self.shared.lock().await;
        Ok(wallet_ids
            .into_iter()
            .filter_map(|id| shared.wallets.get(&id).cloned())
            .collect())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<()> {
        self.new_wallets.push(wallet.clone());
        Ok(())
    }

    async fn persist_mutation(&mut self, wallet: &Wallet, expected_version: i64) -> Result<bool> {
        let shared = self.shared.lock().await;
        let current_version = shared.wallets.get(&wallet.id).map(|w| w.version);
        if current_version != Some(expected_version) {
            return Ok(false);
        }
        drop(shared);
        self.wallet_writes.push((wallet.clone(), expected_version));
        Ok(true)
    }

    async fn insert_transaction(&mut self, new_txn: &NewTransaction) -> Result<Option<Uuid>> {
        let shared = self.shared.lock().await;
        let duplicate = shared
            .transactions
            .iter()
            .any(|t| t.wallet_id == new_txn.wallet_id && t.reference_id == new_txn.reference_id);
        if duplicate {
            return Ok(None);
        }
        drop(shared);

        let created_at = new_txn.created_at_override.unwrap_or_else(default_now);
        let transaction = Transaction {
            id: new_txn.id,
            wallet_id: new_txn.wallet_id,
            transaction_type: new_txn.transaction_type,
            amount: new_txn.amount,
            reference_id: new_txn.reference_id.clone(),
            counterparty_wallet_id: new_txn.counterparty_wallet_id,
            correlation_id: new_txn.correlation_id,
            status: new_txn.status,
            created_at,
        };
        self.new_transactions.push((new_txn.id, transaction));
        Ok(Some(new_txn.id))
    }

    async fn find_transaction_by_reference(
        &mut self,
        wallet_id: Uuid,
        reference_id: &str,
    ) -> Result<Option<Transaction>> {
        if let Some((_, t)) = self
            .new_transactions
            .iter()
            .find(|(_, t)| t.wallet_id == wallet_id && t.reference_id == reference_id)
        {
            return Ok(Some(t.clone()));
        }
        Ok(self
            .shared
            .lock()
            .await
            .transactions
            .iter()
            .find(|t| t.wallet_id == wallet_id && t.reference_id == reference_id)
            .cloned())
    }

    async fn find_transaction_by_correlation(
        &mut self,
        wallet_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<Option<Transaction>> {
        if let Some((_, t)) = self
            .new_transactions
            .iter()
            .find(|(_, t)| t.wallet_id == wallet_id && t.correlation_id == Some(correlation_id))
        {
            return Ok(Some(t.clone()));
        }
        Ok(self
            .shared
            .lock()
            .await
            .transactions
            .iter()
            .find(|t| t.wallet_id == wallet_id && t.correlation_id == Some(correlation_id))
            .cloned())
    }

    async fn store_outbox_event(&mut self, aggregate_id: Uuid, event_type: &str, payload: Value) -> Result<i64> {
        let mut shared = self.shared.lock().await;
        shared.next_outbox_id += 1;
        let id = shared.next_outbox_id;
        drop(shared);
        self.new_outbox.push((id, aggregate_id, event_type.to_string(), payload));
        Ok(id)
    }
}

impl PrimaryStore for InMemoryStore {
    type Uow = InMemoryUow;

    async fn begin(&self) -> Result<Self::Uow> {
        Ok(InMemoryUow {
            shared: self.shared.clone(),
            new_wallets: Vec::new(),
            wallet_writes: Vec::new(),
            new_transactions: Vec::new(),
            new_outbox: Vec::new(),
        })
    }

    async fn commit(&self, uow: Self::Uow) -> Result<()> {
        let mut shared = self.shared.lock().await;

        for (wallet, expected_version) in &uow.wallet_writes {
            let current_version = shared.wallets.get(&wallet.id).map(|w| w.version);
            if current_version != Some(*expected_version) {
                return Err(anyhow!(
                    "optimistic lock race detected at commit for wallet {}",
                    wallet.id
                ));
            }
        }

        for wallet in uow.new_wallets {
            shared.wallets.insert(wallet.id, wallet);
        }
        for (wallet, _) in uow.wallet_writes {
            shared.wallets.insert(wallet.id, wallet);
        }
        for (_, transaction) in uow.new_transactions {
            shared.transactions.push(transaction);
        }
        for (id, aggregate_id, event_type, payload) in uow.new_outbox {
            shared.outbox.push(OutboxEvent {
                id,
                aggregate_id,
                event_type,
                payload,
                created_at: default_now(),
                published_at: None,
                attempts: 0,
            });
        }

        Ok(())
    }
}

impl ReplicaStore for InMemoryStore {
    async fn find_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        Ok(self.shared.lock().await.wallets.get(&wallet_id).cloned())
    }

    async fn completed_transactions_up_to(&self, wallet_id: Uuid, as_of: DateTime<Utc>) -> Result<Vec<Transaction>> {
        let shared = self.shared.lock().await;
        let mut matching: Vec<Transaction> = shared
            .transactions
            .iter()
            .filter(|t| {
                t.wallet_id == wallet_id
                    && t.status == wallet_schemas::TransactionStatus::Completed
                    && t.created_at <= as_of
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// The single in-process task driving these tests never runs two publishers
/// at once, so `claim_batch` has no lock to model - it simply returns the
/// oldest unpublished rows, same as the real claim query's `order by
/// created_at asc`.
impl OutboxStore for InMemoryStore {
    async fn claim_batch(&self, batch_size: i64, _publisher_id: &str) -> Result<Vec<OutboxEvent>> {
        let shared = self.shared.lock().await;
        let mut pending: Vec<OutboxEvent> = shared
            .outbox
            .iter()
            .filter(|e| e.published_at.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(batch_size.max(0) as usize);
        Ok(pending)
    }

    async fn mark_published(&self, outbox_id: i64) -> Result<bool> {
        let mut shared = self.shared.lock().await;
        match shared.outbox.iter_mut().find(|e| e.id == outbox_id) {
            Some(event) => {
                event.published_at = Some(default_now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_failed(&self, outbox_id: i64) -> Result<bool> {
        let mut shared = self.shared.lock().await;
        match shared.outbox.iter_mut().find(|e| e.id == outbox_id) {
            Some(event) => {
                event.attempts += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// `Utc::now()` stand-in used only where the real engine would stamp a
/// timestamp the testkit has no caller-supplied value for (a committed
/// outbox row's `created_at`, a transaction whose fixture didn't override
/// one). Handlers themselves always pass a `created_at` explicitly.
fn default_now() -> DateTime<Utc> {
    Utc::now()
}
