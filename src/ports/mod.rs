//! Ports: interfaces between the application core and its adapters.

mod event_stream;
mod hold_ttl_store;
mod inventory_api;
mod order_store;
mod order_view_store;
mod outbox;
mod seat_allocator;
mod snapshot_store;
mod ticket_store;
mod view_cache;
mod wal_store;

pub use event_stream::{EventStreamConsumer, EventStreamProducer, StreamMessage};
pub use hold_ttl_store::{HoldTtlStore, HoldTtlValue};
pub use inventory_api::{InventoryApi, TryHoldRequest};
pub use order_store::{InsertOutcome, OrderStore, PaymentOutcome};
pub use order_view_store::{OrderViewStore, OrderViewUpdate};
pub use outbox::{OutboxEvent, OutboxInsert, OutboxStatus, OutboxStore};
pub use seat_allocator::SeatAllocator;
pub use snapshot_store::{SnapshotRecord, SnapshotStore};
pub use ticket_store::{TicketOutcome, TicketStore};
pub use view_cache::ViewCache;
pub use wal_store::WalStore;
