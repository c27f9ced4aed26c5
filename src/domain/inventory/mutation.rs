//! Mutation records appended to the inventory write-ahead log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kinds of partition mutations the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    HoldCreated,
    HoldReleased,
    HoldConfirmed,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::HoldCreated => "hold_created",
            MutationKind::HoldReleased => "hold_released",
            MutationKind::HoldConfirmed => "hold_confirmed",
        }
    }

    /// Parses a stored event type. Unknown types return `None` so replay
    /// can skip them without failing recovery.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hold_created" => Some(MutationKind::HoldCreated),
            "hold_released" => Some(MutationKind::HoldReleased),
            "hold_confirmed" => Some(MutationKind::HoldConfirmed),
            _ => None,
        }
    }
}

/// Typed payload carried by every mutation record.
///
/// `hold_id`, `qty` and `capacity` are the only fields consumed during
/// replay; anything else found in a stored payload is dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPayload {
    pub hold_id: String,
    pub qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

/// A single WAL record. `(partition_key, seq)` is the record identity;
/// records for one partition are totally ordered by `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub partition_key: String,
    pub seq: i64,
    pub event_type: String,
    pub payload: MutationPayload,
    pub occurred_at: DateTime<Utc>,
}

impl MutationRecord {
    pub fn new(
        partition_key: impl Into<String>,
        seq: i64,
        kind: MutationKind,
        payload: MutationPayload,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            seq,
            event_type: kind.as_str().to_string(),
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// The parsed mutation kind, or `None` for event types this version
    /// does not know about.
    pub fn kind(&self) -> Option<MutationKind> {
        MutationKind::parse(&self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            MutationKind::HoldCreated,
            MutationKind::HoldReleased,
            MutationKind::HoldConfirmed,
        ] {
            assert_eq!(MutationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_event_type_parses_to_none() {
        assert_eq!(MutationKind::parse("hold_resized"), None);

        let record = MutationRecord {
            partition_key: "p1".to_string(),
            seq: 7,
            event_type: "hold_resized".to_string(),
            payload: MutationPayload {
                hold_id: "h1".to_string(),
                qty: 1,
                capacity: None,
            },
            occurred_at: Utc::now(),
        };
        assert_eq!(record.kind(), None);
    }

    #[test]
    fn payload_decode_ignores_extra_fields() {
        let raw = r#"{"hold_id":"h1","qty":2,"capacity":10,"note":"ignored"}"#;
        let payload: MutationPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.hold_id, "h1");
        assert_eq!(payload.qty, 2);
        assert_eq!(payload.capacity, Some(10));
    }

    #[test]
    fn payload_capacity_is_optional() {
        let raw = r#"{"hold_id":"h1","qty":2}"#;
        let payload: MutationPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.capacity, None);
    }
}
