//! Per-partition inventory state and its pure transitions.
//!
//! A partition is a logical seat bucket (e.g. `"G123|2026-02-11|2nd"`).
//! Invariant at all times:
//!
//! ```text
//! available + Σ holds[*].qty + confirmed == capacity
//! ```
//!
//! Every accepted mutation strictly increments `last_seq`, which makes WAL
//! replay idempotent: a record with `seq <= last_seq` has already been
//! applied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::mutation::{MutationKind, MutationPayload, MutationRecord};

/// Capacity used when a partition is created without a positive one.
pub const DEFAULT_CAPACITY: i64 = 100;

/// A reserved quantity tied to a hold id, unique within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: String,
    pub qty: i64,
}

/// In-memory state of a single inventory partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    pub partition_key: String,
    pub capacity: i64,
    pub available: i64,
    pub confirmed: i64,
    pub last_seq: i64,
    pub holds: HashMap<String, Hold>,
}

impl PartitionState {
    /// Creates a fresh partition. A non-positive capacity falls back to
    /// [`DEFAULT_CAPACITY`].
    pub fn new(partition_key: impl Into<String>, capacity: i64) -> Self {
        let capacity = if capacity <= 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            partition_key: partition_key.into(),
            capacity,
            available: capacity,
            confirmed: 0,
            last_seq: 0,
            holds: HashMap::new(),
        }
    }

    /// Total quantity currently held but not confirmed.
    pub fn held_qty(&self) -> i64 {
        self.holds.values().map(|h| h.qty).sum()
    }

    /// Applies a hold and returns the mutation record to enqueue.
    ///
    /// Preconditions (checked by the shard before calling): `qty > 0`,
    /// `available >= qty`, and no hold with this id exists yet.
    pub fn hold_created(&mut self, hold_id: &str, qty: i64) -> MutationRecord {
        self.available -= qty;
        self.holds.insert(
            hold_id.to_string(),
            Hold {
                hold_id: hold_id.to_string(),
                qty,
            },
        );
        self.last_seq += 1;
        MutationRecord::new(
            self.partition_key.clone(),
            self.last_seq,
            MutationKind::HoldCreated,
            MutationPayload {
                hold_id: hold_id.to_string(),
                qty,
                capacity: Some(self.capacity),
            },
        )
    }

    /// Releases a hold back into availability. Returns `None` when the hold
    /// does not exist.
    pub fn hold_released(&mut self, hold_id: &str) -> Option<MutationRecord> {
        let hold = self.holds.remove(hold_id)?;
        self.available += hold.qty;
        self.last_seq += 1;
        Some(MutationRecord::new(
            self.partition_key.clone(),
            self.last_seq,
            MutationKind::HoldReleased,
            MutationPayload {
                hold_id: hold.hold_id,
                qty: hold.qty,
                capacity: None,
            },
        ))
    }

    /// Confirms a hold, moving its quantity into `confirmed`. Returns `None`
    /// when the hold does not exist.
    pub fn hold_confirmed(&mut self, hold_id: &str) -> Option<MutationRecord> {
        let hold = self.holds.remove(hold_id)?;
        self.confirmed += hold.qty;
        self.last_seq += 1;
        Some(MutationRecord::new(
            self.partition_key.clone(),
            self.last_seq,
            MutationKind::HoldConfirmed,
            MutationPayload {
                hold_id: hold.hold_id,
                qty: hold.qty,
                capacity: None,
            },
        ))
    }

    /// Reverts the mutation described by `record`, restoring the state that
    /// existed before it. Used when the WAL queue refuses the record: the
    /// in-memory change must not outlive its durable counterpart.
    pub fn rollback(&mut self, record: &MutationRecord) {
        match record.kind() {
            Some(MutationKind::HoldCreated) => {
                self.holds.remove(&record.payload.hold_id);
                self.available += record.payload.qty;
                self.last_seq -= 1;
            }
            Some(MutationKind::HoldReleased) => {
                self.available -= record.payload.qty;
                self.holds.insert(
                    record.payload.hold_id.clone(),
                    Hold {
                        hold_id: record.payload.hold_id.clone(),
                        qty: record.payload.qty,
                    },
                );
                self.last_seq -= 1;
            }
            Some(MutationKind::HoldConfirmed) => {
                self.confirmed -= record.payload.qty;
                self.holds.insert(
                    record.payload.hold_id.clone(),
                    Hold {
                        hold_id: record.payload.hold_id.clone(),
                        qty: record.payload.qty,
                    },
                );
                self.last_seq -= 1;
            }
            None => {}
        }
    }

    /// Idempotent replay of a recovered WAL record.
    ///
    /// Records at or below `last_seq` are already reflected in this state
    /// and are skipped. Unknown event types leave the state untouched but
    /// still advance `last_seq` so later records replay in order.
    pub fn apply_recovered(&mut self, record: &MutationRecord) {
        if record.seq <= self.last_seq {
            return;
        }
        match record.kind() {
            Some(MutationKind::HoldCreated) => {
                if !self.holds.contains_key(&record.payload.hold_id) {
                    self.holds.insert(
                        record.payload.hold_id.clone(),
                        Hold {
                            hold_id: record.payload.hold_id.clone(),
                            qty: record.payload.qty,
                        },
                    );
                    self.available -= record.payload.qty;
                }
            }
            Some(MutationKind::HoldReleased) => {
                if let Some(hold) = self.holds.remove(&record.payload.hold_id) {
                    self.available += hold.qty;
                }
            }
            Some(MutationKind::HoldConfirmed) => {
                if let Some(hold) = self.holds.remove(&record.payload.hold_id) {
                    self.confirmed += hold.qty;
                }
            }
            None => {}
        }
        self.last_seq = record.seq;
    }
}
