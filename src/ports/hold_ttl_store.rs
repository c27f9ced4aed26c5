//! HoldTtlStore port - delay queue for expiring uncommitted holds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// Value stored per hold while it awaits confirmation or release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldTtlValue {
    pub partition_key: String,
    pub hold_id: String,
    pub qty: i64,
}

/// Port for the hold TTL store: a keyed value with a wall-clock TTL plus a
/// delay-queue entry scored by the absolute expiry time.
///
/// `poll_expired` returns due values without removing them from the queue;
/// removal is the caller's responsibility once the hold has actually been
/// released.
#[async_trait]
pub trait HoldTtlStore: Send + Sync {
    /// Stores the value and schedules its expiry.
    async fn save(&self, value: &HoldTtlValue) -> Result<(), DomainError>;

    /// Removes the value and its delay-queue entry.
    async fn remove(&self, hold_id: &str) -> Result<(), DomainError>;

    /// Returns up to `limit` holds whose expiry time has passed.
    async fn poll_expired(&self, limit: i64) -> Result<Vec<HoldTtlValue>, DomainError>;
}
