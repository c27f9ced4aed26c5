//! The inventory reservation engine: sharded partition actors, WAL writer,
//! snapshotting, TTL reaping and crash recovery.

mod manager;
mod service;

pub use manager::{PartitionManager, TryHoldCommand, DEFAULT_SHARD_COUNT};
pub use service::{InventoryEngineConfig, InventoryService, INVENTORY_EVENTS_STREAM};
