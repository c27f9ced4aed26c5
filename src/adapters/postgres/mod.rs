//! PostgreSQL adapters for the persistence ports.

mod order_store;
mod order_view_store;
mod outbox_store;
mod snapshot_store;
mod ticket_store;
mod wal_store;

pub use order_store::PostgresOrderStore;
pub use order_view_store::PostgresOrderViewStore;
pub use outbox_store::PostgresOutboxStore;
pub use snapshot_store::PostgresSnapshotStore;
pub use ticket_store::PostgresTicketStore;
pub use wal_store::PostgresWalStore;

use crate::domain::foundation::DomainError;

/// True when the database rejected the statement for a unique-key conflict.
/// Duplicate idempotency keys, provider txn ids and consumed-event entries
/// are expected races, not faults.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Maps any other sqlx error into a `DatabaseError`.
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}
