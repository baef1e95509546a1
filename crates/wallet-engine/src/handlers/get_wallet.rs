//! `GetWallet`: cache-aside read of current wallet state.
//!
//! A cache hit never touches the replica. A miss, a circuit-broken cache, or
//! cache-bypass degradation all fall through identically to the replica -
//! correctness never depends on the cache being up.

use super::validation::validate_wallet_exists;
use crate::bus::QueryHandler;
use crate::outcomes::{QueryOutcome, WalletView};
use crate::ports::ReplicaStore;
use crate::requests::{QueryKind, WalletQuery};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wallet_cache::CachePort;
use wallet_resilience::{CircuitBreaker, DegradationManager};
use wallet_schemas::{Wallet, WalletError};

pub struct GetWalletHandler<R: ReplicaStore, C: CachePort> {
    replica: R,
    cache: C,
    cache_breaker: Arc<CircuitBreaker>,
    degradation: Arc<DegradationManager>,
    cache_ttl: Duration,
}

impl<R: ReplicaStore, C: CachePort> GetWalletHandler<R, C> {
    pub fn new(
        replica: R,
        cache: C,
        cache_breaker: Arc<CircuitBreaker>,
        degradation: Arc<DegradationManager>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            replica,
            cache,
            cache_breaker,
            degradation,
            cache_ttl,
        }
    }

    async fn execute(&self, wallet_id: Uuid) -> Result<Wallet, WalletError> {
        // Deliberately does not short-circuit on `is_cache_bypass()`: the flag
        // is itself driven by the breaker transitions recorded inside
        // `try_cache_get`/`try_cache_put` below, so skipping those calls
        // while bypassed would mean the half-open probe never fires and the
        // flag can never clear. The breaker's own `allow_request` already
        // skips the real cache call except for the periodic recovery probe.
        if let Some(wallet) = self.try_cache_get(wallet_id).await {
            return Ok(wallet);
        }

        let wallet = validate_wallet_exists(self.replica.find_wallet(wallet_id).await, wallet_id)?;
        self.try_cache_put(wallet_id, &wallet).await;
        Ok(wallet)
    }

    async fn try_cache_get(&self, wallet_id: Uuid) -> Option<Wallet> {
        let (allowed, transition) = self.cache_breaker.allow_request();
        self.degradation.apply_cache_breaker_transition(transition);
        if !allowed {
            return None;
        }

        match self.cache.get(wallet_id).await {
            Ok(hit) => {
                let transition = self.cache_breaker.record_success();
                self.degradation.apply_cache_breaker_transition(transition);
                hit
            }
            Err(error) => {
                let transition = self.cache_breaker.record_failure();
                self.degradation.apply_cache_breaker_transition(transition);
                tracing::warn!(%wallet_id, %error, "cache read failed, falling through to replica");
                None
            }
        }
    }

    async fn try_cache_put(&self, wallet_id: Uuid, wallet: &Wallet) {
        let (allowed, transition) = self.cache_breaker.allow_request();
        self.degradation.apply_cache_breaker_transition(transition);
        if !allowed {
            return;
        }
        match self.cache.put(wallet_id, wallet, self.cache_ttl).await {
            Ok(()) => {
                let transition = self.cache_breaker.record_success();
                self.degradation.apply_cache_breaker_transition(transition);
            }
            Err(error) => {
                let transition = self.cache_breaker.record_failure();
                self.degradation.apply_cache_breaker_transition(transition);
                tracing::warn!(%wallet_id, %error, "best-effort cache population failed");
            }
        }
    }
}

impl<R: ReplicaStore + 'static, C: CachePort + 'static> QueryHandler for GetWalletHandler<R, C> {
    fn kind(&self) -> QueryKind {
        QueryKind::GetWallet
    }

    fn handle(&self, query: WalletQuery) -> BoxFuture<'_, Result<QueryOutcome, WalletError>> {
        Box::pin(async move {
            let WalletQuery::GetWallet(query) = query else {
                return Err(WalletError::internal("bus dispatched wrong query kind to GetWalletHandler"));
            };
            let wallet = self.execute(query.wallet_id).await?;
            Ok(QueryOutcome::Wallet(WalletView {
                id: wallet.id,
                user_id: wallet.user_id,
                balance: wallet.balance,
                status: wallet.status,
                created_at: wallet.created_at,
                updated_at: wallet.updated_at,
            }))
        })
    }
}
