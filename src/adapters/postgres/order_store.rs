//! PostgreSQL implementation of the OrderStore port.
//!
//! Every mutating method is one short transaction (read-committed, the
//! Postgres default): the order write and the outbox row commit together.
//! Conditional `UPDATE ... WHERE status = $expected` predicates provide the
//! optimistic concurrency; unique-key conflicts on `idempotency_key` and
//! `provider_txn_id` are expected races surfaced as outcomes, not errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::order::{Order, OrderStatus, Payment};
use crate::ports::{InsertOutcome, OrderStore, OutboxInsert, PaymentOutcome};

use super::{db_error, is_unique_violation, PostgresOutboxStore};

pub struct PostgresOrderStore {
    pool: PgPool,
    outbox: PostgresOutboxStore,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        let outbox = PostgresOutboxStore::order_outbox(pool.clone());
        Self { pool, outbox }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: String,
    idempotency_key: String,
    status: String,
    amount_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            order_id: row.order_id,
            idempotency_key: row.idempotency_key,
            status: OrderStatus::parse(&row.status)?,
            amount_cents: row.amount_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ORDER: &str = r#"
    SELECT order_id, idempotency_key, status, amount_cents, created_at, updated_at
    FROM orders
"#;

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, DomainError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{} WHERE order_id = $1", SELECT_ORDER))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find order failed", e))?;
        row.map(Order::try_from)
            .transpose()?
            .ok_or_else(|| DomainError::order_not_found(order_id))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{} WHERE idempotency_key = $1", SELECT_ORDER))
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find order by idempotency key failed", e))?;
        row.map(Order::try_from).transpose()
    }

    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OutboxInsert,
    ) -> Result<InsertOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (order_id, idempotency_key, status, amount_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.idempotency_key)
        .bind(order.status.as_str())
        .bind(order.amount_cents)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Ok(InsertOutcome::DuplicateKey);
            }
            return Err(db_error("insert order failed", err));
        }

        self.outbox
            .insert_in_tx(&mut tx, event)
            .await
            .map_err(|e| db_error("insert outbox row failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit create order failed", e))?;
        Ok(InsertOutcome::Inserted)
    }

    async fn transition_with_outbox(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        event: &OutboxInsert,
    ) -> Result<bool, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = now() WHERE order_id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(order_id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update order status failed", e))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        self.outbox
            .insert_in_tx(&mut tx, event)
            .await
            .map_err(|e| db_error("insert outbox row failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit status transition failed", e))?;
        Ok(true)
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        event: &OutboxInsert,
    ) -> Result<PaymentOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (payment_id, order_id, provider_txn_id, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&payment.payment_id)
        .bind(&payment.order_id)
        .bind(&payment.provider_txn_id)
        .bind(&payment.status)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Ok(PaymentOutcome::DuplicateTxn);
            }
            return Err(db_error("insert payment failed", err));
        }

        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = now() WHERE order_id = $2 AND status = $3",
        )
        .bind(OrderStatus::Paid.as_str())
        .bind(&payment.order_id)
        .bind(OrderStatus::Reserved.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update order to paid failed", e))?;

        if result.rows_affected() == 0 {
            return Ok(PaymentOutcome::StatusConflict);
        }

        self.outbox
            .insert_in_tx(&mut tx, event)
            .await
            .map_err(|e| db_error("insert outbox row failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit payment failed", e))?;
        Ok(PaymentOutcome::Applied)
    }
}
