use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;
use wallet_schemas::{Wallet, WalletStatus};

fn row_to_wallet(row: &sqlx::postgres::PgRow) -> Result<Wallet> {
    let status_str: String = row.try_get("status")?;
    Ok(Wallet {
        id: row.try_get("wallet_id")?,
        user_id: row.try_get("user_id")?,
        balance: row.try_get("balance")?,
        status: WalletStatus::from_str(&status_str)
            .with_context(|| format!("unrecognized wallet status in storage: {status_str}"))?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Write-path access to the `wallets` table. Every method here is meant to
/// be called from within an open [`crate::with_tx`] unit of work.
#[derive(Debug, Clone)]
pub struct PrimaryWalletRepository {
    pool: PgPool,
}

impl PrimaryWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a brand-new wallet row. Called outside a caller-supplied
    /// transaction by handlers that manage their own `with_tx` scope, or
    /// with `tx` passed through when part of a larger unit of work.
    pub async fn insert(&self, tx: &mut Transaction<'_, Postgres>, wallet: &Wallet) -> Result<()> {
        sqlx::query(
            r#"
            insert into wallets (wallet_id, user_id, balance, status, version, created_at, updated_at)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(wallet.id)
        .bind(&wallet.user_id)
        .bind(wallet.balance)
        .bind(wallet.status.as_str())
        .bind(wallet.version)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut **tx)
        .await
        .context("wallet insert failed")?;
        Ok(())
    }

    /// Load a wallet for update within `tx`, locking its row so concurrent
    /// writers serialize on it. Returns `None` if the wallet does not exist.
    pub async fn load_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
    ) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            select wallet_id, user_id, balance, status, version, created_at, updated_at
            from wallets
            where wallet_id = $1
            for update
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut **tx)
        .await
        .context("wallet load_for_update failed")?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// Load multiple wallets for update, locking rows in ascending wallet-id
    /// order to avoid deadlock cycles between concurrent transfers.
    pub async fn load_many_for_update_ordered(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut wallet_ids: Vec<Uuid>,
    ) -> Result<Vec<Wallet>> {
        wallet_ids.sort();
        wallet_ids.dedup();
        let mut out = Vec::with_capacity(wallet_ids.len());
        for id in wallet_ids {
            if let Some(w) = self.load_for_update(tx, id).await? {
                out.push(w);
            }
        }
        Ok(out)
    }

    /// Persist a wallet's mutated balance/status/version/updated_at.
    ///
    /// `expected_version` is the version read earlier in the same unit of
    /// work; the update's `where` clause re-checks it, and a row count of
    /// zero here would indicate a lost-update race that the locking row read
    /// (`for update`) already rules out within one transaction. The check
    /// remains as defense against callers that bypass `load_for_update`.
    pub async fn persist_mutation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet: &Wallet,
        expected_version: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            update wallets
               set balance = $1,
                   status = $2,
                   version = $3,
                   updated_at = $4
             where wallet_id = $5
               and version = $6
            "#,
        )
        .bind(wallet.balance)
        .bind(wallet.status.as_str())
        .bind(wallet.version)
        .bind(wallet.updated_at)
        .bind(wallet.id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await
        .context("wallet persist_mutation failed")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_id(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            select wallet_id, user_id, balance, status, version, created_at, updated_at
            from wallets
            where wallet_id = $1
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .context("wallet find_by_id failed")?;

        row.as_ref().map(row_to_wallet).transpose()
    }
}

/// Read-path access to the `wallets` table, backed by the replica pool.
/// Never used for mutation; the historical-balance fold and the
/// cache-aside `get_wallet` query are its only callers.
#[derive(Debug, Clone)]
pub struct ReplicaWalletRepository {
    pool: PgPool,
}

impl ReplicaWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, wallet_id: Uuid) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            select wallet_id, user_id, balance, status, version, created_at, updated_at
            from wallets
            where wallet_id = $1
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await
        .context("replica wallet find_by_id failed")?;

        row.as_ref().map(row_to_wallet).transpose()
    }

    /// Lightweight readiness probe: a trivial round-trip against the pool.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("select 1")
            .fetch_one(&self.pool)
            .await
            .context("replica ping failed")?;
        Ok(())
    }
}
