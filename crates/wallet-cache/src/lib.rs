//! The cache-aside read path's cache port: a key -> [`Wallet`] view with a
//! TTL, fronting the replica repository.
//!
//! The cache is a performance optimization only. Monetary correctness never
//! depends on it: a miss always falls through to the replica, and every
//! write path invalidates (best-effort) rather than updates, so a failed
//! invalidation bounds staleness by TTL rather than by a correctness gap.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;
use wallet_schemas::Wallet;

pub const ENV_CACHE_URL: &str = "WALLET_CACHE_URL";

/// The cache-aside port consumed by the query handlers and by the
/// resilience layer's circuit breaker.
///
/// Implementations must treat every method as best-effort where the
/// contract says so (`put`, `invalidate`): a transport failure there is
/// reported to the caller so it can be metered, but it must never be
/// escalated into a failed mutation or a failed read that could otherwise
/// be served by the replica.
pub trait CachePort: Send + Sync {
    /// Look up a wallet by id. `Ok(None)` is a clean miss; `Err` signals a
    /// transport-level failure the caller (usually wrapped in a circuit
    /// breaker) should count toward the breaker's failure ratio.
    fn get(&self, id: Uuid) -> impl std::future::Future<Output = Result<Option<Wallet>>> + Send;

    /// Populate the cache entry for `id` with `ttl`. Best-effort, idempotent.
    fn put(&self, id: Uuid, wallet: &Wallet, ttl: Duration) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove the cache entry for `id`. Best-effort, idempotent. Must be
    /// called after every successful mutation to the wallet.
    fn invalidate(&self, id: Uuid) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Lightweight connectivity probe consumed by the readiness/health surface.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

fn cache_key(id: Uuid) -> String {
    format!("wallet:{id}")
}

/// Redis-backed [`CachePort`] using a multiplexed, auto-reconnecting
/// connection manager so callers never have to re-establish a connection
/// after a transient network blip.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        Ok(Self { conn })
    }

    pub async fn connect_from_env() -> Result<Self> {
        let url = std::env::var(ENV_CACHE_URL)
            .with_context(|| format!("missing env var {ENV_CACHE_URL}"))?;
        Self::connect(&url).await
    }
}

impl CachePort for RedisCache {
    async fn get(&self, id: Uuid) -> Result<Option<Wallet>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(cache_key(id))
            .await
            .context("cache get failed")?;
        match raw {
            Some(s) => {
                let wallet = serde_json::from_str(&s).context("cache payload deserialize failed")?;
                Ok(Some(wallet))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, id: Uuid, wallet: &Wallet, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(wallet).context("cache payload serialize failed")?;
        let _: () = conn
            .set_ex(cache_key(id), payload, ttl.as_secs().max(1))
            .await
            .context("cache put failed")?;
        Ok(())
    }

    async fn invalidate(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(cache_key(id)).await.context("cache invalidate failed")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("cache ping failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_namespaced_by_wallet_prefix() {
        let id = Uuid::nil();
        assert_eq!(cache_key(id), format!("wallet:{id}"));
    }
}
