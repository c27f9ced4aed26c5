//! Event stream ports - publish and manual-commit consume.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// A message fetched from a stream, identified by its broker-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    pub payload: Vec<u8>,
}

/// Port for publishing to an event stream.
///
/// `key` is the partitioning key; messages with the same key are delivered
/// in publish order. Delivery is at-least-once: consumers deduplicate by
/// the envelope's `event_id`.
#[async_trait]
pub trait EventStreamProducer: Send + Sync {
    async fn publish(&self, stream: &str, key: &str, payload: &[u8]) -> Result<(), DomainError>;
}

/// Port for consuming one stream with manual offset commits.
///
/// A fetched message is re-delivered after a restart unless `commit` was
/// called for it. `fetch` returns `None` when no message arrived within
/// the adapter's block window.
#[async_trait]
pub trait EventStreamConsumer: Send + Sync {
    async fn fetch(&self) -> Result<Option<StreamMessage>, DomainError>;

    async fn commit(&self, message: &StreamMessage) -> Result<(), DomainError>;
}
