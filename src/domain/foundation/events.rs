//! Event envelope shared by every stream in the system.
//!
//! All events published to `inventory.events`, `order.events` and
//! `ticket.events` use the same transport wrapper:
//! - `event_id` for deduplication by consumers,
//! - `event_type` for routing,
//! - `aggregate_id` as the stream partitioning key,
//! - `occurred_at` for ordering diagnostics,
//! - `payload` as the event-specific JSON body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::DomainError;

/// Transport envelope for domain events.
///
/// `aggregate_id` doubles as the stream key, which gives per-aggregate
/// ordering on every stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique ID for this event instance.
    pub event_id: String,

    /// ID of the aggregate that emitted this event (partition key or order id).
    pub aggregate_id: String,

    /// Event type for routing (e.g. "hold_created", "OrderPaid").
    pub event_type: String,

    /// When the event occurred, UTC.
    pub occurred_at: DateTime<Utc>,

    /// Event-specific payload as JSON.
    #[serde(default)]
    pub payload: JsonValue,
}

impl EventEnvelope {
    /// Creates an envelope with a fresh UUID event id.
    pub fn new(
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    /// Creates an envelope reusing an existing event id (outbox rows keep
    /// the id assigned at insert time).
    pub fn with_event_id(
        event_id: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    /// Parses an envelope from raw stream bytes.
    pub fn from_slice(raw: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(raw).map_err(|e| {
            DomainError::serialization(format!("decode event envelope failed: {}", e))
        })
    }

    /// Serializes the envelope to JSON bytes for publishing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self)
            .map_err(|e| DomainError::serialization(format!("encode event envelope failed: {}", e)))
    }
}
