//! Postgres persistence for the wallet service: connection helpers, the
//! primary/replica wallet repositories, the transaction repository and the
//! outbox repository.
//!
//! Every write lives inside [`with_tx`], a scoped unit-of-work helper that
//! guarantees rollback on every early-return path and commits only once the
//! closure returns `Ok`.

pub mod outbox_repo;
pub mod transaction_repo;
pub mod wallet_repo;

pub use outbox_repo::{OutboxEventRow, OutboxRepository};
pub use transaction_repo::TransactionRepository;
pub use wallet_schemas::NewTransaction;
pub use wallet_repo::{PrimaryWalletRepository, ReplicaWalletRepository};

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub const ENV_PRIMARY_DATABASE_URL: &str = "WALLET_PRIMARY_DATABASE_URL";
pub const ENV_REPLICA_DATABASE_URL: &str = "WALLET_REPLICA_DATABASE_URL";

/// Connect to the primary (write) database using `WALLET_PRIMARY_DATABASE_URL`.
pub async fn connect_primary_from_env() -> Result<PgPool> {
    connect(&std::env::var(ENV_PRIMARY_DATABASE_URL).with_context(|| {
        format!("missing env var {ENV_PRIMARY_DATABASE_URL}")
    })?)
    .await
}

/// Connect to the replica (read) database using `WALLET_REPLICA_DATABASE_URL`.
/// Falls back to the primary URL when unset, matching a single-node deployment.
pub async fn connect_replica_from_env(primary: &PgPool) -> Result<PgPool> {
    match std::env::var(ENV_REPLICA_DATABASE_URL) {
        Ok(url) if !url.trim().is_empty() => connect(&url).await,
        _ => Ok(primary.clone()),
    }
}

async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations against `pool`.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Test helper: connect using `WALLET_PRIMARY_DATABASE_URL` and ensure migrations
/// are applied. Used by integration tests that require a live Postgres instance.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_primary_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Connectivity + schema presence check, consumed by the readiness probe.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'wallets'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_wallets_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_wallets_table: bool,
}

/// Run `f` inside a single database transaction on `pool`.
///
/// `f` receives a mutable borrow of the open transaction and returns a
/// boxed future resolving to `Result<T>`. The transaction commits only if
/// `f` returns `Ok`; any early return (including `?` propagation) rolls
/// back. Callers write `with_tx(pool, |tx| Box::pin(async move { ... })).await`.
pub async fn with_tx<T, F>(pool: &PgPool, f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut sqlx::Transaction<'_, sqlx::Postgres>) -> BoxFuture<'a, Result<T>>,
{
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    match f(&mut tx).await {
        Ok(value) => {
            tx.commit().await.context("commit transaction failed")?;
            Ok(value)
        }
        Err(e) => {
            let _ = tx.rollback().await;
            Err(e)
        }
    }
}
