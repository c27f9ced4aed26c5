//! ViewCache port - short-TTL cache in front of the read model.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::query::OrderView;

/// Port for the order view cache. Misses and errors on reads are not
/// fatal; the projector invalidates on every write, so the cache is
/// eventually consistent with the read-model database.
#[async_trait]
pub trait ViewCache: Send + Sync {
    async fn get_order_view(&self, order_id: &str) -> Result<Option<OrderView>, DomainError>;

    async fn set_order_view(&self, view: &OrderView) -> Result<(), DomainError>;

    async fn invalidate_order_view(&self, order_id: &str) -> Result<(), DomainError>;
}
