//! Mock seat allocator standing in for the real allocation RPC.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::SeatAllocator;

/// Deterministic allocator: seat derived from the order id prefix, so
/// repeated allocation for the same order yields the same seat.
pub struct MockSeatAllocator;

#[async_trait]
impl SeatAllocator for MockSeatAllocator {
    async fn allocate_seat(&self, order_id: &str) -> Result<String, DomainError> {
        let key: String = order_id.chars().take(8).collect();
        Ok(format!("CARRIAGE-1-{}", key))
    }
}
