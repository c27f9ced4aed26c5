//! SeatAllocator port - opaque seat assignment collaborator.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Port for the seat allocation RPC. The engine treats it as opaque: one
/// call per paid order, returning the allocated seat number.
#[async_trait]
pub trait SeatAllocator: Send + Sync {
    async fn allocate_seat(&self, order_id: &str) -> Result<String, DomainError>;
}
