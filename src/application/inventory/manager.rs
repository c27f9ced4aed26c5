//! Sharded single-writer partition manager.
//!
//! The manager owns N shards. Each shard is a tokio task that owns a map of
//! `PartitionState` and serves commands from a bounded channel, so every
//! read and write of a given partition happens on exactly one task - no
//! locks, no shared mutable state. A partition key maps to shard
//! `fnv1a_32(key) % N`. Cross-shard operations do not exist.
//!
//! Accepted mutations are enqueued on the shared WAL queue with a
//! **non-blocking** send. When the queue is full, the shard rolls the
//! in-memory change back and answers `backpressure`, preserving the
//! invariant that every state the engine exposes is (or will be) durably
//! recorded.
//!
//! All mutating commands reply with a deep copy of the post-mutation state,
//! so callers observe an immutable snapshot.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::domain::foundation::DomainError;
use crate::domain::inventory::{MutationRecord, PartitionState};

/// Default shard count when the configured value is non-positive.
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Capacity of each shard's command channel.
const SHARD_CHANNEL_CAPACITY: usize = 1024;

/// Input for `try_hold`.
#[derive(Debug, Clone)]
pub struct TryHoldCommand {
    pub partition_key: String,
    pub hold_id: String,
    pub qty: i64,
    pub capacity: i64,
}

enum ShardCommand {
    TryHold {
        cmd: TryHoldCommand,
        reply: oneshot::Sender<Result<PartitionState, DomainError>>,
    },
    ReleaseHold {
        partition_key: String,
        hold_id: String,
        reply: oneshot::Sender<Result<PartitionState, DomainError>>,
    },
    ConfirmHold {
        partition_key: String,
        hold_id: String,
        reply: oneshot::Sender<Result<PartitionState, DomainError>>,
    },
    GetAvailability {
        partition_key: String,
        reply: oneshot::Sender<Option<i64>>,
    },
    RestoreState {
        state: PartitionState,
        reply: oneshot::Sender<()>,
    },
    ApplyRecovered {
        record: MutationRecord,
        reply: oneshot::Sender<()>,
    },
    ExportSnapshots {
        reply: oneshot::Sender<Vec<PartitionState>>,
    },
}

/// Handle over the shard tasks. Cheap to clone.
#[derive(Clone)]
pub struct PartitionManager {
    shards: Vec<mpsc::Sender<ShardCommand>>,
}

impl PartitionManager {
    /// Spawns `shard_count` shard tasks (default 32 when non-positive), all
    /// feeding the given WAL queue.
    pub fn new(shard_count: usize, wal_queue: mpsc::Sender<MutationRecord>) -> Self {
        let shard_count = if shard_count == 0 {
            DEFAULT_SHARD_COUNT
        } else {
            shard_count
        };
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            let (tx, rx) = mpsc::channel(SHARD_CHANNEL_CAPACITY);
            let shard = Shard {
                states: HashMap::new(),
                wal_queue: wal_queue.clone(),
            };
            tokio::spawn(shard.run(rx));
            shards.push(tx);
        }
        Self { shards }
    }

    pub async fn try_hold(&self, cmd: TryHoldCommand) -> Result<PartitionState, DomainError> {
        if cmd.qty <= 0 {
            return Err(DomainError::invalid_quantity());
        }
        if cmd.partition_key.is_empty() || cmd.hold_id.is_empty() {
            return Err(DomainError::validation(
                "partition_key",
                "partition_key and hold_id are required",
            ));
        }
        let (reply, rx) = oneshot::channel();
        let key = cmd.partition_key.clone();
        self.dispatch(&key, ShardCommand::TryHold { cmd, reply })
            .await?;
        Self::await_reply(rx).await?
    }

    pub async fn release_hold(
        &self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            partition_key,
            ShardCommand::ReleaseHold {
                partition_key: partition_key.to_string(),
                hold_id: hold_id.to_string(),
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    pub async fn confirm_hold(
        &self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            partition_key,
            ShardCommand::ConfirmHold {
                partition_key: partition_key.to_string(),
                hold_id: hold_id.to_string(),
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await?
    }

    /// Returns `Some(available)` when the partition exists.
    pub async fn get_availability(&self, partition_key: &str) -> Result<Option<i64>, DomainError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(
            partition_key,
            ShardCommand::GetAvailability {
                partition_key: partition_key.to_string(),
                reply,
            },
        )
        .await?;
        Self::await_reply(rx).await
    }

    /// Replaces the per-key state verbatim. Recovery only.
    pub async fn restore_state(&self, state: PartitionState) -> Result<(), DomainError> {
        let (reply, rx) = oneshot::channel();
        let key = state.partition_key.clone();
        self.dispatch(&key, ShardCommand::RestoreState { state, reply })
            .await?;
        Self::await_reply(rx).await
    }

    /// Idempotent replay of a recovered WAL record. Recovery only.
    pub async fn apply_recovered(&self, record: MutationRecord) -> Result<(), DomainError> {
        let (reply, rx) = oneshot::channel();
        let key = record.partition_key.clone();
        self.dispatch(&key, ShardCommand::ApplyRecovered { record, reply })
            .await?;
        Self::await_reply(rx).await
    }

    /// Deep clones of every state owned by every shard.
    pub async fn export_snapshots(&self) -> Result<Vec<PartitionState>, DomainError> {
        let mut all = Vec::new();
        for shard in &self.shards {
            let (reply, rx) = oneshot::channel();
            shard
                .send(ShardCommand::ExportSnapshots { reply })
                .await
                .map_err(|_| DomainError::dependency("partition shard unavailable"))?;
            all.extend(Self::await_reply(rx).await?);
        }
        Ok(all)
    }

    async fn dispatch(&self, partition_key: &str, cmd: ShardCommand) -> Result<(), DomainError> {
        let idx = shard_index(partition_key, self.shards.len());
        self.shards[idx]
            .send(cmd)
            .await
            .map_err(|_| DomainError::dependency("partition shard unavailable"))
    }

    async fn await_reply<T>(rx: oneshot::Receiver<T>) -> Result<T, DomainError> {
        rx.await
            .map_err(|_| DomainError::internal("partition shard dropped the reply"))
    }
}

/// One shard: exclusive owner of its partitions.
struct Shard {
    states: HashMap<String, PartitionState>,
    wal_queue: mpsc::Sender<MutationRecord>,
}

impl Shard {
    async fn run(mut self, mut rx: mpsc::Receiver<ShardCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                ShardCommand::TryHold { cmd, reply } => {
                    let _ = reply.send(self.handle_try_hold(cmd));
                }
                ShardCommand::ReleaseHold {
                    partition_key,
                    hold_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_release(&partition_key, &hold_id));
                }
                ShardCommand::ConfirmHold {
                    partition_key,
                    hold_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_confirm(&partition_key, &hold_id));
                }
                ShardCommand::GetAvailability {
                    partition_key,
                    reply,
                } => {
                    let available = self.states.get(&partition_key).map(|st| st.available);
                    let _ = reply.send(available);
                }
                ShardCommand::RestoreState { state, reply } => {
                    self.states.insert(state.partition_key.clone(), state);
                    let _ = reply.send(());
                }
                ShardCommand::ApplyRecovered { record, reply } => {
                    self.handle_apply_recovered(record);
                    let _ = reply.send(());
                }
                ShardCommand::ExportSnapshots { reply } => {
                    let states = self.states.values().cloned().collect();
                    let _ = reply.send(states);
                }
            }
        }
    }

    fn handle_try_hold(&mut self, cmd: TryHoldCommand) -> Result<PartitionState, DomainError> {
        let state = self
            .states
            .entry(cmd.partition_key.clone())
            .or_insert_with(|| PartitionState::new(cmd.partition_key.clone(), cmd.capacity));

        if state.holds.contains_key(&cmd.hold_id) {
            return Ok(state.clone());
        }
        if state.available < cmd.qty {
            return Err(DomainError::insufficient_stock());
        }

        let record = state.hold_created(&cmd.hold_id, cmd.qty);
        Self::enqueue_or_rollback(&self.wal_queue, state, record)
    }

    fn handle_release(
        &mut self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let state = self
            .states
            .get_mut(partition_key)
            .ok_or_else(DomainError::hold_not_found)?;
        let record = state
            .hold_released(hold_id)
            .ok_or_else(DomainError::hold_not_found)?;
        Self::enqueue_or_rollback(&self.wal_queue, state, record)
    }

    fn handle_confirm(
        &mut self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let state = self
            .states
            .get_mut(partition_key)
            .ok_or_else(DomainError::hold_not_found)?;
        let record = state
            .hold_confirmed(hold_id)
            .ok_or_else(DomainError::hold_not_found)?;
        Self::enqueue_or_rollback(&self.wal_queue, state, record)
    }

    fn handle_apply_recovered(&mut self, record: MutationRecord) {
        let capacity = record.payload.capacity.unwrap_or(0);
        let state = self
            .states
            .entry(record.partition_key.clone())
            .or_insert_with(|| PartitionState::new(record.partition_key.clone(), capacity));
        state.apply_recovered(&record);
    }

    fn enqueue_or_rollback(
        wal_queue: &mpsc::Sender<MutationRecord>,
        state: &mut PartitionState,
        record: MutationRecord,
    ) -> Result<PartitionState, DomainError> {
        match wal_queue.try_send(record.clone()) {
            Ok(()) => Ok(state.clone()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                state.rollback(&record);
                Err(DomainError::backpressure())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                state.rollback(&record);
                Err(DomainError::dependency("wal queue closed"))
            }
        }
    }
}

fn shard_index(key: &str, shard_count: usize) -> usize {
    fnv1a_32(key.as_bytes()) as usize % shard_count
}

/// 32-bit FNV-1a over the partition key.
fn fnv1a_32(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;
    let mut hash = OFFSET_BASIS;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
