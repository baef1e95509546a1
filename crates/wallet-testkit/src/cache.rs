//! An in-memory stand-in for [`wallet_cache::CachePort`], used to drive the
//! query handlers' cache-aside path (hit, miss, TTL expiry, breaker-gated
//! failure injection) without a live Redis instance.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;
use wallet_cache::CachePort;
use wallet_schemas::Wallet;

struct Entry {
    wallet: Wallet,
    expires_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<Uuid, Entry>>>,
    fail_next_get: Arc<std::sync::atomic::AtomicUsize>,
    fail_next_put: Arc<std::sync::atomic::AtomicUsize>,
    fail_next_invalidate: Arc<std::sync::atomic::AtomicUsize>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `get`/`put`/`invalidate` (respectively)
    /// fail, to exercise the circuit breaker and degradation transitions
    /// around the cache port.
    pub fn fail_next_get(&self, n: usize) {
        self.fail_next_get.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_next_put(&self, n: usize) {
        self.fail_next_put.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn fail_next_invalidate(&self, n: usize) {
        self.fail_next_invalidate.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.entries.lock().await.contains_key(&id)
    }

    fn take_one(counter: &std::sync::atomic::AtomicUsize) -> bool {
        let remaining = counter.load(std::sync::atomic::Ordering::SeqCst);
        if remaining == 0 {
            return false;
        }
        counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        true
    }
}

impl CachePort for InMemoryCache {
    async fn get(&self, id: Uuid) -> Result<Option<Wallet>> {
        if Self::take_one(&self.fail_next_get) {
            anyhow::bail!("simulated cache get failure");
        }
        let mut entries = self.entries.lock().await;
        match entries.get(&id) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.wallet.clone())),
            Some(_) => {
                entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, id: Uuid, wallet: &Wallet, ttl: Duration) -> Result<()> {
        if Self::take_one(&self.fail_next_put) {
            anyhow::bail!("simulated cache put failure");
        }
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(60));
        self.entries.lock().await.insert(
            id,
            Entry {
                wallet: wallet.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, id: Uuid) -> Result<()> {
        if Self::take_one(&self.fail_next_invalidate) {
            anyhow::bail!("simulated cache invalidate failure");
        }
        self.entries.lock().await.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
