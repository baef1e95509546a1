//! wallet-daemon entry point.
//!
//! Thin by design: load config and secrets, connect every adapter, wire the
//! command/query buses and the outbox publisher, then serve HTTP. All
//! business logic lives in `wallet-engine`; this file only composes it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use wallet_cache::{CachePort, RedisCache};
use wallet_config::{load_layered_yaml, resolve_secrets, unused_pointers, WalletSettings};
use wallet_daemon::adapters::{PgOutboxStore, PgPrimaryStore, PgReplicaStore};
use wallet_daemon::state::{AppState, BuildInfo, ReadinessProbes};
use wallet_daemon::routes;
use wallet_engine::bus::{CommandBus, QueryBus};
use wallet_engine::handlers::{
    CreateWalletHandler, DepositHandler, GetHistoricalBalanceHandler, GetWalletHandler,
    TransferHandler, WithdrawHandler,
};
use wallet_engine::health_monitor::{HealthMonitorConfig, PrimaryHealthMonitor};
use wallet_engine::outbox::{OutboxPublisher, PublisherConfig};
use wallet_eventlog::{EventLogPort, KafkaEventLog};
use wallet_resilience::{CircuitBreaker, DegradationManager, Metrics, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let settings = load_settings()?;
    let secrets = resolve_secrets().context("resolving connection secrets")?;

    let primary_pool = wallet_db::connect_primary_from_env()
        .await
        .context("connecting to primary database")?;
    wallet_db::migrate(&primary_pool).await.context("running migrations")?;
    let replica_pool = wallet_db::connect_replica_from_env(&primary_pool)
        .await
        .context("connecting to replica database")?;

    let cache = RedisCache::connect(&secrets.cache_url)
        .await
        .context("connecting to cache")?;
    let event_log =
        Arc::new(KafkaEventLog::new(&secrets.eventlog_brokers, settings.eventlog.topic.clone())
            .context("constructing event log client")?);

    let metrics = Arc::new(Metrics::new());
    let degradation = Arc::new(DegradationManager::new());
    let cache_breaker = Arc::new(CircuitBreaker::new(
        "cache",
        settings.circuit.cache_failure_ratio,
        settings.circuit.cache_cool_down,
    ));
    let event_log_breaker = Arc::new(CircuitBreaker::new("event_log", 0.5, Duration::from_secs(30)));
    let optimistic_lock_retry = RetryPolicy::new(
        settings.retry.optimistic_lock.max_attempts,
        settings.retry.optimistic_lock.initial_backoff,
    );
    let transient_retry =
        RetryPolicy::new(settings.retry.transient.max_attempts, settings.retry.transient.initial_backoff);

    let primary_store = PgPrimaryStore::new(primary_pool.clone());
    let replica_store = PgReplicaStore::new(replica_pool.clone());

    let mut command_bus = CommandBus::new(metrics.clone());
    command_bus
        .register(Box::new(CreateWalletHandler::new(
            primary_store.clone(),
            degradation.clone(),
            transient_retry,
            metrics.clone(),
        )))
        .context("registering create_wallet handler")?;
    command_bus
        .register(Box::new(DepositHandler::new(
            primary_store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            optimistic_lock_retry,
            transient_retry,
            metrics.clone(),
        )))
        .context("registering deposit handler")?;
    command_bus
        .register(Box::new(WithdrawHandler::new(
            primary_store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            optimistic_lock_retry,
            transient_retry,
            metrics.clone(),
        )))
        .context("registering withdraw handler")?;
    command_bus
        .register(Box::new(TransferHandler::new(
            primary_store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            optimistic_lock_retry,
            transient_retry,
            metrics.clone(),
        )))
        .context("registering transfer handler")?;

    let mut query_bus = QueryBus::new(metrics.clone());
    query_bus
        .register(Box::new(GetWalletHandler::new(
            replica_store.clone(),
            cache.clone(),
            cache_breaker.clone(),
            degradation.clone(),
            settings.cache.ttl,
        )))
        .context("registering get_wallet handler")?;
    query_bus
        .register(Box::new(GetHistoricalBalanceHandler::new(replica_store.clone())))
        .context("registering get_historical_balance handler")?;

    let outbox_store = Arc::new(PgOutboxStore::new(primary_pool.clone()));
    let publisher = Arc::new(OutboxPublisher::new(
        outbox_store,
        event_log.clone(),
        event_log_breaker,
        degradation.clone(),
        metrics.clone(),
        PublisherConfig {
            poll_interval: settings.outbox.poll_interval,
            batch_size: settings.outbox.batch_size,
            publisher_id: format!("wallet-daemon-{}", std::process::id()),
        },
    ));

    let health_monitor = Arc::new(PrimaryHealthMonitor::new(
        primary_store.clone(),
        degradation.clone(),
        HealthMonitorConfig {
            poll_interval: settings.degradation.primary_health_poll_interval,
            failure_threshold: settings.degradation.primary_health_failure_threshold,
            success_threshold: settings.degradation.primary_health_success_threshold,
            auto_exit: settings.degradation.read_only_auto_exit,
        },
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let publisher_handle = {
        let publisher = publisher.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { publisher.run(shutdown_rx).await })
    };
    let health_monitor_handle = {
        let health_monitor = health_monitor.clone();
        tokio::spawn(async move { health_monitor.run(shutdown_rx).await })
    };

    let cache_for_ping = cache.clone();
    let event_log_for_ping = event_log.clone();
    let state = Arc::new(AppState {
        command_bus: Arc::new(command_bus),
        query_bus: Arc::new(query_bus),
        degradation,
        metrics,
        readiness: ReadinessProbes {
            primary: primary_pool,
            replica: replica_pool,
            cache_ping: Arc::new(move || {
                let cache = cache_for_ping.clone();
                Box::pin(async move { cache.ping().await })
            }),
            event_log_ping: Arc::new(move || {
                let event_log = event_log_for_ping.clone();
                Box::pin(async move { event_log.ping().await })
            }),
        },
        build: BuildInfo {
            service: "wallet-daemon",
            version: env!("CARGO_PKG_VERSION"),
        },
    });

    let app = routes::build_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors_localhost_only());

    let addr: SocketAddr = settings
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid server.bind_addr: {}", settings.server.bind_addr))?;
    info!("wallet-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    let _ = shutdown_tx.send(true);
    let _ = publisher_handle.await;
    let _ = health_monitor_handle.await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}

fn load_settings() -> anyhow::Result<WalletSettings> {
    let paths_env = std::env::var("WALLET_CONFIG_PATHS").unwrap_or_default();
    let paths: Vec<&str> = paths_env.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if paths.is_empty() {
        return Ok(WalletSettings::default());
    }

    let loaded = load_layered_yaml(&paths).context("loading layered configuration")?;
    info!(config_hash = %loaded.config_hash, "configuration loaded");
    for pointer in unused_pointers(&loaded.config_json) {
        tracing::warn!(pointer = %pointer, "unrecognized config key");
    }
    Ok(WalletSettings::from_json(&loaded.config_json))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
