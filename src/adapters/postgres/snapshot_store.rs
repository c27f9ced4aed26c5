//! PostgreSQL implementation of the SnapshotStore port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::inventory::PartitionState;
use crate::ports::{SnapshotRecord, SnapshotStore};

use super::db_error;

/// One snapshot row per partition in `inventory_snapshot`, upserted on the
/// primary key.
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    partition_key: String,
    snapshot_seq: i64,
    state_blob: JsonValue,
    created_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for SnapshotRecord {
    type Error = DomainError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let state: PartitionState = serde_json::from_value(row.state_blob).map_err(|e| {
            DomainError::database(format!("decode snapshot state failed: {}", e))
        })?;
        Ok(SnapshotRecord {
            partition_key: row.partition_key,
            snapshot_seq: row.snapshot_seq,
            state,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn upsert(&self, record: &SnapshotRecord) -> Result<(), DomainError> {
        let state_blob = serde_json::to_value(&record.state)?;
        sqlx::query(
            r#"
            INSERT INTO inventory_snapshot (partition_key, snapshot_seq, state_blob, created_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (partition_key) DO UPDATE SET
                snapshot_seq = EXCLUDED.snapshot_seq,
                state_blob = EXCLUDED.state_blob,
                created_at = now()
            "#,
        )
        .bind(&record.partition_key)
        .bind(record.snapshot_seq)
        .bind(state_blob)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("snapshot upsert failed", e))?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SnapshotRecord>, DomainError> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT partition_key, snapshot_seq, state_blob, created_at
            FROM inventory_snapshot
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("snapshot load failed", e))?;

        rows.into_iter().map(SnapshotRecord::try_from).collect()
    }
}
