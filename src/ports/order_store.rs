//! OrderStore port - durable order state with transactional outbox writes.
//!
//! Each mutating method runs a single database transaction at read-committed
//! isolation: the order change and its outbox row commit together or not at
//! all. Optimistic concurrency uses conditional `UPDATE ... WHERE status =
//! expected` predicates; callers resolve zero-row updates by re-reading.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::order::{Order, OrderStatus, Payment};

use super::outbox::OutboxInsert;

/// Outcome of inserting a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The idempotency key already exists; the caller re-reads by key.
    DuplicateKey,
}

/// Outcome of recording a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Payment row inserted and order moved `RESERVED -> PAID`.
    Applied,
    /// `provider_txn_id` already recorded; the transaction was discarded.
    DuplicateTxn,
    /// The conditional status update matched zero rows; the transaction was
    /// discarded and the caller re-reads to decide.
    StatusConflict,
}

/// Port for order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, DomainError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, DomainError>;

    /// Inserts the order and its outbox row in one transaction.
    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OutboxInsert,
    ) -> Result<InsertOutcome, DomainError>;

    /// Conditionally updates `from -> to` and inserts the outbox row in one
    /// transaction. Returns `false` (nothing persisted) when the current
    /// status no longer matches `from`.
    async fn transition_with_outbox(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        event: &OutboxInsert,
    ) -> Result<bool, DomainError>;

    /// Inserts the payment row, moves the order `RESERVED -> PAID` and
    /// inserts the outbox row, all in one transaction.
    async fn record_payment(
        &self,
        payment: &Payment,
        event: &OutboxInsert,
    ) -> Result<PaymentOutcome, DomainError>;
}
