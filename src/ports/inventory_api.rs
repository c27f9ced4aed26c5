//! InventoryApi port - the order side's view of the inventory engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

/// Request to place a hold on a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryHoldRequest {
    pub partition_key: String,
    pub hold_id: String,
    pub qty: i64,
    pub capacity: i64,
}

/// Port for the inventory engine as seen by the order service and the
/// ticket worker. Implemented by the HTTP client adapter in production and
/// by in-memory fakes in tests.
///
/// `release_hold` and `confirm_hold` surface `HoldNotFound` as an error;
/// callers that treat re-release as idempotent match on that code.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    async fn try_hold(&self, request: &TryHoldRequest) -> Result<(), DomainError>;

    async fn release_hold(&self, partition_key: &str, hold_id: &str) -> Result<(), DomainError>;

    async fn confirm_hold(&self, partition_key: &str, hold_id: &str) -> Result<(), DomainError>;
}
