//! PostgreSQL implementation of the WalStore port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::inventory::{MutationPayload, MutationRecord};
use crate::ports::WalStore;

use super::db_error;

/// Append-only log of partition mutations in `inventory_wal`.
pub struct PostgresWalStore {
    pool: PgPool,
}

impl PostgresWalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WalRow {
    partition_key: String,
    seq: i64,
    event_type: String,
    payload: JsonValue,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<WalRow> for MutationRecord {
    type Error = DomainError;

    fn try_from(row: WalRow) -> Result<Self, Self::Error> {
        let payload: MutationPayload = serde_json::from_value(row.payload).map_err(|e| {
            DomainError::database(format!("decode wal payload failed: {}", e))
        })?;
        Ok(MutationRecord {
            partition_key: row.partition_key,
            seq: row.seq,
            event_type: row.event_type,
            payload,
            occurred_at: row.occurred_at,
        })
    }
}

#[async_trait]
impl WalStore for PostgresWalStore {
    async fn append(&self, record: &MutationRecord) -> Result<(), DomainError> {
        let payload = serde_json::to_value(&record.payload)?;
        sqlx::query(
            r#"
            INSERT INTO inventory_wal (partition_key, seq, event_type, payload, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.partition_key)
        .bind(record.seq)
        .bind(&record.event_type)
        .bind(payload)
        .bind(record.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("wal append failed", e))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MutationRecord>, DomainError> {
        let rows: Vec<WalRow> = sqlx::query_as(
            r#"
            SELECT partition_key, seq, event_type, payload, occurred_at
            FROM inventory_wal
            ORDER BY partition_key ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("wal load failed", e))?;

        rows.into_iter().map(MutationRecord::try_from).collect()
    }
}
