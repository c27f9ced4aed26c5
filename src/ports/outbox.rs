//! Outbox ports - transactional event persistence and publisher-side access.
//!
//! Rows are inserted only inside the same database transaction as the
//! aggregate mutation they describe; a background publisher later drains
//! them to the event bus. Delivery is at-least-once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::foundation::DomainError;

/// Status of an outbox row in the delivery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    /// Row written but not yet published.
    Pending,
    /// Publish failed at least once; scheduled for a later attempt.
    Retry,
    /// Row successfully published to the event bus.
    Published,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Retry => "RETRY",
            OutboxStatus::Published => "PUBLISHED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(OutboxStatus::Pending),
            "RETRY" => Ok(OutboxStatus::Retry),
            "PUBLISHED" => Ok(OutboxStatus::Published),
            other => Err(DomainError::database(format!(
                "invalid outbox status value: {}",
                other
            ))),
        }
    }
}

/// Payload for a new outbox row, created alongside the aggregate mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxInsert {
    pub event_id: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: JsonValue,
}

impl OutboxInsert {
    /// Creates an insert with a fresh UUID event id.
    pub fn new(
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload,
        }
    }
}

/// A persisted outbox row as seen by the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_id: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Publisher-side port over an outbox table.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Lists rows due for publishing: `status ∈ {PENDING, RETRY}` with
    /// `next_retry_at <= now`, ordered by `id ASC`.
    async fn list_due(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError>;

    /// Marks a row published with `published_at = now`.
    async fn mark_published(&self, id: i64) -> Result<(), DomainError>;

    /// Schedules a retry with the given attempt count and deadline.
    async fn mark_retry(
        &self,
        id: i64,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        last_error: &str,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbox_insert_assigns_uuid_event_ids() {
        let a = OutboxInsert::new("o-1", "OrderCreated", json!({}));
        let b = OutboxInsert::new("o-1", "OrderCreated", json!({}));
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.aggregate_id, "o-1");
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OutboxStatus::Pending,
            OutboxStatus::Retry,
            OutboxStatus::Published,
        ] {
            assert_eq!(OutboxStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(OutboxStatus::parse("SHIPPED").is_err());
    }
}
