//! Adapters: infrastructure implementations of the ports.

pub mod http;
mod inventory_client;
pub mod postgres;
pub mod redis;
mod seat_allocator;

pub use inventory_client::HttpInventoryClient;
pub use seat_allocator::MockSeatAllocator;
