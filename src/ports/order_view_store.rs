//! OrderViewStore port - idempotent projection into the read model.
//!
//! Projection methods own the transaction: the `consumed_events` ledger
//! insert and the view upsert commit together. A duplicate `(event_id,
//! consumer)` pair commits the transaction without projecting, which is
//! what makes handlers safe under at-least-once delivery.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::query::OrderView;

/// View fields derived from one order event. Merge semantics on upsert:
/// `status` and `updated_at` are always overwritten, `amount_cents` only
/// when positive, `provider_txn_id` only when non-empty, `seat_no` never.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderViewUpdate {
    pub order_id: String,
    pub status: String,
    pub amount_cents: i64,
    pub provider_txn_id: String,
}

/// Port for the denormalized order view and its idempotence ledger.
#[async_trait]
pub trait OrderViewStore: Send + Sync {
    /// Reads one view row; `OrderViewNotFound` when absent.
    async fn get(&self, order_id: &str) -> Result<OrderView, DomainError>;

    /// Records the event as consumed and, when `update` is given, applies
    /// the conditional-merge upsert. Returns `false` when the event was
    /// already consumed by this consumer (nothing projected).
    async fn project_order_event(
        &self,
        event_id: &str,
        consumer: &str,
        update: Option<&OrderViewUpdate>,
    ) -> Result<bool, DomainError>;

    /// Ticket variant: marks the view `TICKETED` with the allocated seat.
    /// Returns `false` on a duplicate event.
    async fn project_ticket_event(
        &self,
        event_id: &str,
        consumer: &str,
        order_id: &str,
        seat_no: &str,
    ) -> Result<bool, DomainError>;

    /// Cold-start rebuild from the orders table: upserts the `limit` most
    /// recently updated orders. Returns the number of rows written.
    async fn rebuild_from_orders(&self, limit: i64) -> Result<u64, DomainError>;
}
