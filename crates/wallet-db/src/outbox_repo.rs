use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// A row in `outbox_events`, including the claim-lease columns that have no
/// counterpart on the domain `OutboxEvent` type.
#[derive(Debug, Clone)]
pub struct OutboxEventRow {
    pub outbox_id: i64,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
}

impl OutboxEventRow {
    pub fn into_domain(self) -> wallet_schemas::OutboxEvent {
        wallet_schemas::OutboxEvent {
            id: self.outbox_id,
            aggregate_id: self.aggregate_id,
            event_type: self.event_type,
            payload: self.payload,
            created_at: self.created_at,
            published_at: self.published_at,
            attempts: self.attempts,
        }
    }
}

fn row_to_outbox_event(row: &sqlx::postgres::PgRow) -> Result<OutboxEventRow> {
    Ok(OutboxEventRow {
        outbox_id: row.try_get("outbox_id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        attempts: row.try_get("attempts")?,
        created_at: row.try_get("created_at")?,
        published_at: row.try_get("published_at")?,
        claimed_at: row.try_get("claimed_at")?,
        claimed_by: row.try_get("claimed_by")?,
    })
}

#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: PgPool,
}

impl OutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an outbox row using the caller's open transaction, so the
    /// insert is visible if and only if the domain mutation it describes
    /// commits alongside it.
    pub async fn store(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
        event_type: &str,
        payload: Value,
    ) -> Result<i64> {
        let (outbox_id,): (i64,) = sqlx::query_as(
            r#"
            insert into outbox_events (aggregate_id, event_type, payload)
            values ($1, $2, $3)
            returning outbox_id
            "#,
        )
        .bind(aggregate_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&mut **tx)
        .await
        .context("outbox store failed")?;

        Ok(outbox_id)
    }

    /// Atomically claim up to `batch_size` unpublished rows for exclusive
    /// dispatch by this publisher instance. `FOR UPDATE SKIP LOCKED` lets
    /// multiple publishers run concurrently without double-claiming a row.
    pub async fn claim_batch(
        &self,
        batch_size: i64,
        publisher_id: &str,
    ) -> Result<Vec<OutboxEventRow>> {
        let rows = sqlx::query(
            r#"
            with to_claim as (
                select outbox_id
                from outbox_events
                where published_at is null
                order by created_at asc
                limit $1
                for update skip locked
            )
            update outbox_events
               set claimed_at = now(),
                   claimed_by = $2
             where outbox_id in (select outbox_id from to_claim)
            returning outbox_id, aggregate_id, event_type, payload, attempts,
                      created_at, published_at, claimed_at, claimed_by
            "#,
        )
        .bind(batch_size)
        .bind(publisher_id)
        .fetch_all(&self.pool)
        .await
        .context("outbox claim_batch failed")?;

        rows.iter().map(row_to_outbox_event).collect()
    }

    /// Mark a claimed row published. Returns `true` if a row transitioned.
    pub async fn mark_published(&self, outbox_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            update outbox_events
               set published_at = now()
             where outbox_id = $1
            returning outbox_id
            "#,
        )
        .bind(outbox_id)
        .fetch_optional(&self.pool)
        .await
        .context("outbox mark_published failed")?;

        Ok(row.is_some())
    }

    /// Record a failed publish attempt: increment `attempts` and release the
    /// claim so the next polling cycle retries the row.
    pub async fn mark_failed(&self, outbox_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            update outbox_events
               set attempts = attempts + 1,
                   claimed_at = null,
                   claimed_by = null
             where outbox_id = $1
            returning outbox_id
            "#,
        )
        .bind(outbox_id)
        .fetch_optional(&self.pool)
        .await
        .context("outbox mark_failed failed")?;

        Ok(row.is_some())
    }

    /// Recovery/diagnostic query: rows not yet published, oldest first.
    pub async fn list_unpublished(&self, limit: i64) -> Result<Vec<OutboxEventRow>> {
        let rows = sqlx::query(
            r#"
            select outbox_id, aggregate_id, event_type, payload, attempts,
                   created_at, published_at, claimed_at, claimed_by
            from outbox_events
            where published_at is null
            order by created_at asc
            limit $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("outbox list_unpublished failed")?;

        rows.iter().map(row_to_outbox_event).collect()
    }
}
