//! PostgreSQL implementation of the OrderViewStore port.
//!
//! Each projection is one transaction: the `consumed_events` ledger insert
//! and the view upsert commit together. A duplicate `(event_id, consumer)`
//! commits the ledger check alone, so redelivered events change nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::query::OrderView;
use crate::ports::{OrderViewStore, OrderViewUpdate};

use super::db_error;

pub struct PostgresOrderViewStore {
    pool: PgPool,
}

impl PostgresOrderViewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderViewRow {
    order_id: String,
    status: String,
    amount_cents: i64,
    provider_txn_id: String,
    seat_no: String,
    updated_at: DateTime<Utc>,
}

impl From<OrderViewRow> for OrderView {
    fn from(row: OrderViewRow) -> Self {
        OrderView {
            order_id: row.order_id,
            status: row.status,
            amount_cents: row.amount_cents,
            provider_txn_id: row.provider_txn_id,
            seat_no: row.seat_no,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl OrderViewStore for PostgresOrderViewStore {
    async fn get(&self, order_id: &str) -> Result<OrderView, DomainError> {
        let row: Option<OrderViewRow> = sqlx::query_as(
            r#"
            SELECT order_id, status, amount_cents, provider_txn_id, seat_no, updated_at
            FROM query_order_view
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("read order view failed", e))?;

        row.map(OrderView::from)
            .ok_or_else(|| DomainError::order_view_not_found(order_id))
    }

    async fn project_order_event(
        &self,
        event_id: &str,
        consumer: &str,
        update: Option<&OrderViewUpdate>,
    ) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let marked = sqlx::query(
            r#"
            INSERT INTO consumed_events (event_id, consumer_name, consumed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (event_id, consumer_name) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(consumer)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark event consumed failed", e))?;

        if marked.rows_affected() == 0 {
            tx.commit()
                .await
                .map_err(|e| db_error("commit duplicate event failed", e))?;
            return Ok(false);
        }

        if let Some(update) = update {
            sqlx::query(
                r#"
                INSERT INTO query_order_view (order_id, status, amount_cents, provider_txn_id, seat_no, updated_at)
                VALUES ($1, $2, $3, $4, '', now())
                ON CONFLICT (order_id) DO UPDATE SET
                    status = EXCLUDED.status,
                    amount_cents = CASE
                        WHEN EXCLUDED.amount_cents > 0 THEN EXCLUDED.amount_cents
                        ELSE query_order_view.amount_cents
                    END,
                    provider_txn_id = CASE
                        WHEN EXCLUDED.provider_txn_id <> '' THEN EXCLUDED.provider_txn_id
                        ELSE query_order_view.provider_txn_id
                    END,
                    updated_at = now()
                "#,
            )
            .bind(&update.order_id)
            .bind(&update.status)
            .bind(update.amount_cents)
            .bind(&update.provider_txn_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("upsert order view failed", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit order projection failed", e))?;
        Ok(true)
    }

    async fn project_ticket_event(
        &self,
        event_id: &str,
        consumer: &str,
        order_id: &str,
        seat_no: &str,
    ) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let marked = sqlx::query(
            r#"
            INSERT INTO consumed_events (event_id, consumer_name, consumed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (event_id, consumer_name) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(consumer)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark event consumed failed", e))?;

        if marked.rows_affected() == 0 {
            tx.commit()
                .await
                .map_err(|e| db_error("commit duplicate event failed", e))?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO query_order_view (order_id, status, amount_cents, provider_txn_id, seat_no, updated_at)
            VALUES ($1, 'TICKETED', 0, '', $2, now())
            ON CONFLICT (order_id) DO UPDATE SET
                status = 'TICKETED',
                seat_no = EXCLUDED.seat_no,
                updated_at = now()
            "#,
        )
        .bind(order_id)
        .bind(seat_no)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark view ticketed failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit ticket projection failed", e))?;
        Ok(true)
    }

    async fn rebuild_from_orders(&self, limit: i64) -> Result<u64, DomainError> {
        #[derive(Debug, sqlx::FromRow)]
        struct RebuildRow {
            order_id: String,
            status: String,
            amount_cents: i64,
            updated_at: DateTime<Utc>,
        }

        let rows: Vec<RebuildRow> = sqlx::query_as(
            r#"
            SELECT order_id, status, amount_cents, updated_at
            FROM orders
            ORDER BY updated_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load orders for rebuild failed", e))?;

        let mut written = 0u64;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO query_order_view (order_id, status, amount_cents, provider_txn_id, seat_no, updated_at)
                VALUES ($1, $2, $3, '', '', $4)
                ON CONFLICT (order_id) DO UPDATE SET
                    status = EXCLUDED.status,
                    amount_cents = EXCLUDED.amount_cents,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&row.order_id)
            .bind(&row.status)
            .bind(row.amount_cents)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("rebuild view row failed", e))?;
            written += 1;
        }
        Ok(written)
    }
}
