//! Application layer: services and background loops orchestrating the
//! domain through ports.

pub mod inventory;
pub mod order;
mod outbox_publisher;
pub mod query;
pub mod ticket;

pub use outbox_publisher::{
    retry_backoff, truncate_error, OutboxPublisher, OutboxPublisherConfig,
};
