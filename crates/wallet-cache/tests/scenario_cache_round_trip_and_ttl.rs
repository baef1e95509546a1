//! Scenario: cache round-trip, invalidation and miss-after-TTL behavior.
//!
//! Skips gracefully when `WALLET_CACHE_URL` is unset (no live Redis in this
//! environment).

use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use wallet_cache::{CachePort, RedisCache};
use wallet_schemas::Wallet;

async fn make_cache() -> Option<RedisCache> {
    let url = std::env::var(wallet_cache::ENV_CACHE_URL).ok()?;
    Some(RedisCache::connect(&url).await.expect("connect"))
}

#[tokio::test]
#[ignore = "requires WALLET_CACHE_URL; run: WALLET_CACHE_URL=redis://127.0.0.1:6379 cargo test -p wallet-cache -- --include-ignored"]
async fn put_then_get_returns_the_same_wallet() {
    let Some(cache) = make_cache().await else {
        return;
    };
    let wallet = Wallet::new(Uuid::new_v4(), "u1", Utc::now());

    cache.put(wallet.id, &wallet, Duration::from_secs(30)).await.expect("put");
    let fetched = cache.get(wallet.id).await.expect("get").expect("present");
    assert_eq!(fetched, wallet);
}

#[tokio::test]
#[ignore = "requires WALLET_CACHE_URL; run: WALLET_CACHE_URL=redis://127.0.0.1:6379 cargo test -p wallet-cache -- --include-ignored"]
async fn invalidate_removes_the_entry() {
    let Some(cache) = make_cache().await else {
        return;
    };
    let wallet = Wallet::new(Uuid::new_v4(), "u2", Utc::now());

    cache.put(wallet.id, &wallet, Duration::from_secs(30)).await.expect("put");
    cache.invalidate(wallet.id).await.expect("invalidate");

    let fetched = cache.get(wallet.id).await.expect("get");
    assert!(fetched.is_none());
}

#[tokio::test]
#[ignore = "requires WALLET_CACHE_URL; run: WALLET_CACHE_URL=redis://127.0.0.1:6379 cargo test -p wallet-cache -- --include-ignored"]
async fn entry_expires_after_ttl() {
    let Some(cache) = make_cache().await else {
        return;
    };
    let wallet = Wallet::new(Uuid::new_v4(), "u3", Utc::now());

    cache.put(wallet.id, &wallet, Duration::from_secs(1)).await.expect("put");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let fetched = cache.get(wallet.id).await.expect("get");
    assert!(fetched.is_none());
}

#[tokio::test]
#[ignore = "requires WALLET_CACHE_URL; run: WALLET_CACHE_URL=redis://127.0.0.1:6379 cargo test -p wallet-cache -- --include-ignored"]
async fn ping_succeeds_against_a_reachable_instance() {
    let Some(cache) = make_cache().await else {
        return;
    };
    cache.ping().await.expect("ping");
}
