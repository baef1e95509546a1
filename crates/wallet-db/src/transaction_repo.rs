use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;
use wallet_schemas::{
    NewTransaction, Transaction as WalletTransaction, TransactionStatus, TransactionType,
};

fn row_to_transaction(row: &sqlx::postgres::PgRow) -> Result<WalletTransaction> {
    let type_str: String = row.try_get("type")?;
    let status_str: String = row.try_get("status")?;
    Ok(WalletTransaction {
        id: row.try_get("transaction_id")?,
        wallet_id: row.try_get("wallet_id")?,
        transaction_type: TransactionType::from_str(&type_str)
            .with_context(|| format!("unrecognized transaction type in storage: {type_str}"))?,
        amount: row.try_get("amount")?,
        reference_id: row.try_get("reference_id")?,
        counterparty_wallet_id: row.try_get("counterparty_wallet_id")?,
        correlation_id: row.try_get("correlation_id")?,
        status: TransactionStatus::from_str(&status_str)
            .with_context(|| format!("unrecognized transaction status in storage: {status_str}"))?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a transaction row. Uniqueness on `(wallet_id, reference_id)`
    /// enforces idempotency: this returns `Ok(None)` (not an error) when a
    /// row with the same key already exists, so the caller can re-read and
    /// reply with the prior transaction id instead of failing the request.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_txn: &NewTransaction,
    ) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            insert into transactions (
                transaction_id, wallet_id, counterparty_wallet_id, correlation_id,
                type, amount, reference_id, status, created_at
            ) values (
                $1, $2, $3, $4, $5, $6, $7, $8, coalesce($9, now())
            )
            on conflict (wallet_id, reference_id) do nothing
            returning transaction_id
            "#,
        )
        .bind(new_txn.id)
        .bind(new_txn.wallet_id)
        .bind(new_txn.counterparty_wallet_id)
        .bind(new_txn.correlation_id)
        .bind(new_txn.transaction_type.as_str())
        .bind(new_txn.amount)
        .bind(&new_txn.reference_id)
        .bind(new_txn.status.as_str())
        .bind(new_txn.created_at_override)
        .fetch_optional(&mut **tx)
        .await
        .context("transaction insert failed")?;

        Ok(row.map(|(id,)| id))
    }

    /// Look up the transaction previously recorded for `(wallet_id,
    /// reference_id)`, used to serve an idempotent replay. Reads through the
    /// open `tx` rather than the pool so it can see rows inserted earlier in
    /// the same in-flight unit of work, not just committed ones.
    pub async fn find_by_wallet_and_reference(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        reference_id: &str,
    ) -> Result<Option<WalletTransaction>> {
        let row = sqlx::query(
            r#"
            select transaction_id, wallet_id, counterparty_wallet_id, correlation_id,
                   type, amount, reference_id, status, created_at
            from transactions
            where wallet_id = $1 and reference_id = $2
            "#,
        )
        .bind(wallet_id)
        .bind(reference_id)
        .fetch_optional(&mut **tx)
        .await
        .context("transaction find_by_wallet_and_reference failed")?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    /// Look up the transaction previously recorded for `(wallet_id,
    /// correlation_id)`, used to replay the destination leg of a transfer
    /// whose source leg's `reference_id` uniqueness already served the
    /// idempotency check. Reads through the open `tx` for the same reason as
    /// `find_by_wallet_and_reference`.
    pub async fn find_by_wallet_and_correlation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<Option<WalletTransaction>> {
        let row = sqlx::query(
            r#"
            select transaction_id, wallet_id, counterparty_wallet_id, correlation_id,
                   type, amount, reference_id, status, created_at
            from transactions
            where wallet_id = $1 and correlation_id = $2
            "#,
        )
        .bind(wallet_id)
        .bind(correlation_id)
        .fetch_optional(&mut **tx)
        .await
        .context("transaction find_by_wallet_and_correlation failed")?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    /// All `COMPLETED` rows for `wallet_id` with `created_at <= as_of`,
    /// ordered ascending by `(created_at, transaction_id)` to break ties
    /// deterministically for the historical-balance fold.
    pub async fn completed_up_to(
        &self,
        wallet_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>> {
        let rows = sqlx::query(
            r#"
            select transaction_id, wallet_id, counterparty_wallet_id, correlation_id,
                   type, amount, reference_id, status, created_at
            from transactions
            where wallet_id = $1
              and status = 'COMPLETED'
              and created_at <= $2
            order by created_at asc, transaction_id asc
            "#,
        )
        .bind(wallet_id)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .context("transaction completed_up_to failed")?;

        rows.iter().map(row_to_transaction).collect()
    }
}
