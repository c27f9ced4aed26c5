//! PostgreSQL implementation of the TicketStore port.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::domain::order::OrderStatus;
use crate::domain::ticket::Ticket;
use crate::ports::{OutboxInsert, TicketOutcome, TicketStore};

use super::{db_error, PostgresOutboxStore};

pub struct PostgresTicketStore {
    pool: PgPool,
    outbox: PostgresOutboxStore,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        let outbox = PostgresOutboxStore::ticket_outbox(pool.clone());
        Self { pool, outbox }
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn issue_ticket(
        &self,
        ticket: &Ticket,
        event: &OutboxInsert,
    ) -> Result<TicketOutcome, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction failed", e))?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE order_id = $1 FOR UPDATE")
                .bind(&ticket.order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("read order status failed", e))?;
        if status.as_deref() != Some(OrderStatus::Paid.as_str()) {
            return Ok(TicketOutcome::OrderNotPaid);
        }

        // ON CONFLICT DO NOTHING keeps the transaction usable when a
        // concurrent worker already issued this ticket.
        let inserted = sqlx::query(
            r#"
            INSERT INTO tickets (ticket_id, order_id, passenger_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(&ticket.ticket_id)
        .bind(&ticket.order_id)
        .bind(&ticket.passenger_name)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("insert ticket failed", e))?;

        if inserted.rows_affected() == 0 {
            return Ok(TicketOutcome::AlreadyIssued);
        }

        sqlx::query(
            "UPDATE orders SET status = $1, updated_at = now() WHERE order_id = $2 AND status = $3",
        )
        .bind(OrderStatus::Ticketed.as_str())
        .bind(&ticket.order_id)
        .bind(OrderStatus::Paid.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("mark order ticketed failed", e))?;

        self.outbox
            .insert_in_tx(&mut tx, event)
            .await
            .map_err(|e| db_error("insert ticket outbox row failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit ticket issue failed", e))?;
        Ok(TicketOutcome::Issued)
    }
}
