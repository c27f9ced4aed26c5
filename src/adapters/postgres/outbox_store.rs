//! PostgreSQL outbox, shared by the order service (`outbox`) and the
//! ticket worker (`ticket_outbox`). Both tables have the same shape, so
//! one adapter serves both, parameterized by table name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::foundation::DomainError;
use crate::ports::{OutboxEvent, OutboxInsert, OutboxStatus, OutboxStore};

use super::db_error;

#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    table: &'static str,
}

impl PostgresOutboxStore {
    /// The order service's outbox.
    pub fn order_outbox(pool: PgPool) -> Self {
        Self {
            pool,
            table: "outbox",
        }
    }

    /// The ticket worker's outbox.
    pub fn ticket_outbox(pool: PgPool) -> Self {
        Self {
            pool,
            table: "ticket_outbox",
        }
    }

    /// Inserts a pending row inside the caller's transaction. This is the
    /// only write path for new rows: an outbox row never exists without
    /// the aggregate change it describes.
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        insert: &OutboxInsert,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO {} (event_id, aggregate_id, event_type, payload, status, retry_count, next_retry_at, created_at)
            VALUES ($1, $2, $3, $4, 'PENDING', 0, now(), now())
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(&insert.event_id)
            .bind(&insert.aggregate_id)
            .bind(&insert.event_type)
            .bind(&insert.payload)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: i64,
    event_id: String,
    aggregate_id: String,
    event_type: String,
    payload: JsonValue,
    status: String,
    retry_count: i32,
    next_retry_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxEvent {
            id: row.id,
            event_id: row.event_id,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            status: OutboxStatus::parse(&row.status)?,
            retry_count: row.retry_count,
            next_retry_at: row.next_retry_at,
            created_at: row.created_at,
            published_at: row.published_at,
            last_error: row.last_error,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn list_due(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError> {
        let sql = format!(
            r#"
            SELECT id, event_id, aggregate_id, event_type, payload, status,
                   retry_count, next_retry_at, created_at, published_at, last_error
            FROM {}
            WHERE status IN ('PENDING', 'RETRY') AND next_retry_at <= now()
            ORDER BY id ASC
            LIMIT $1
            "#,
            self.table
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list pending outbox failed", e))?;

        rows.into_iter().map(OutboxEvent::try_from).collect()
    }

    async fn mark_published(&self, id: i64) -> Result<(), DomainError> {
        let sql = format!(
            "UPDATE {} SET status = 'PUBLISHED', published_at = now() WHERE id = $1",
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("mark outbox published failed", e))?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<(), DomainError> {
        let sql = format!(
            r#"
            UPDATE {} SET status = 'RETRY', retry_count = $2, next_retry_at = $3, last_error = $4
            WHERE id = $1
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(retry_count)
            .bind(next_retry_at)
            .bind(last_error)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("mark outbox retry failed", e))?;
        Ok(())
    }
}
