//! WalStore port - durable append-only log of partition mutations.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::inventory::MutationRecord;

/// Port for the inventory write-ahead log.
///
/// `(partition_key, seq)` identifies a record; `load_all` must return
/// records ordered by `(partition_key ASC, seq ASC)` so recovery replays
/// each partition in sequence order.
#[async_trait]
pub trait WalStore: Send + Sync {
    /// Appends one record to the log.
    async fn append(&self, record: &MutationRecord) -> Result<(), DomainError>;

    /// Loads every record, ordered by `(partition_key ASC, seq ASC)`.
    async fn load_all(&self) -> Result<Vec<MutationRecord>, DomainError>;
}
