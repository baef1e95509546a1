//! Best-effort cache invalidation shared by every write handler, guarded by
//! the cache circuit breaker.
//!
//! A failed invalidation never fails the mutation that triggered it: the
//! mutation already committed, so the worst outcome is a stale cache entry
//! bounded by TTL. The breaker exists only to stop hammering a cache that is
//! already down.

use std::sync::Arc;
use uuid::Uuid;
use wallet_cache::CachePort;
use wallet_resilience::{CircuitBreaker, DegradationManager};

pub(crate) async fn invalidate_best_effort<C: CachePort>(
    cache: &C,
    breaker: &Arc<CircuitBreaker>,
    degradation: &Arc<DegradationManager>,
    wallet_id: Uuid,
) {
    let (allowed, transition) = breaker.allow_request();
    degradation.apply_cache_breaker_transition(transition);
    if !allowed {
        return;
    }

    match cache.invalidate(wallet_id).await {
        Ok(()) => {
            let transition = breaker.record_success();
            degradation.apply_cache_breaker_transition(transition);
        }
        Err(error) => {
            let transition = breaker.record_failure();
            degradation.apply_cache_breaker_transition(transition);
            tracing::warn!(%wallet_id, %error, "best-effort cache invalidation failed");
        }
    }
}
