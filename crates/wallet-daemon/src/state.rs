//! Shared runtime state for wallet-daemon.
//!
//! The command and query buses are the only thing a route handler touches
//! for business logic; every
//! concrete port binding (Postgres, Redis, Kafka) is resolved once in
//! `main.rs` and erased behind `Box<dyn CommandHandler>` /
//! `Box<dyn QueryHandler>` registered on the buses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::PgPool;
use wallet_engine::{CommandBus, QueryBus};
use wallet_resilience::{DegradationManager, Metrics};

/// A boxed connectivity probe captured at startup, used so the readiness
/// route does not need to know the concrete cache/event-log types.
pub type PingFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

/// The dependencies the readiness probe checks: primary and replica
/// reachable, cache reachable (or cache-bypass acknowledged), event log
/// reachable (or event-processing-degraded acknowledged).
#[derive(Clone)]
pub struct ReadinessProbes {
    pub primary: PgPool,
    pub replica: PgPool,
    pub cache_ping: PingFn,
    pub event_log_ping: PingFn,
}

/// Static build metadata included in health responses.
#[derive(Clone, Copy)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub command_bus: Arc<CommandBus>,
    pub query_bus: Arc<QueryBus>,
    pub degradation: Arc<DegradationManager>,
    pub metrics: Arc<Metrics>,
    pub readiness: ReadinessProbes,
    pub build: BuildInfo,
}
