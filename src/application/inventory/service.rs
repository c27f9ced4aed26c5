//! Inventory engine service: command surface, recovery and background loops.
//!
//! The service owns the partition manager, the WAL queue, and a process-wide
//! operation counter that gates snapshotting. Three background loops run
//! after recovery:
//!
//! 1. **WAL writer** - drains the mutation queue, appends each record to the
//!    durable log and publishes it to `inventory.events`. Failures are
//!    logged and counted; the loop never stops.
//! 2. **Snapshot loop** - every tick, once enough operations accumulated,
//!    exports all partition states and upserts them.
//! 3. **TTL reaper** - polls the delay queue for expired holds and releases
//!    them back into their partitions.
//!
//! Loops follow the `watch`-channel shutdown idiom and expose their bodies
//! (`write_wal_record`, `persist_snapshots`, `reap_expired_holds`) for
//! direct use in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::domain::inventory::{MutationRecord, PartitionState};
use crate::ports::{
    EventStreamProducer, HoldTtlStore, HoldTtlValue, SnapshotRecord, SnapshotStore, WalStore,
};

use super::manager::{PartitionManager, TryHoldCommand};

/// Stream that carries partition mutation events.
pub const INVENTORY_EVENTS_STREAM: &str = "inventory.events";

/// Per-I/O deadline used by the background loops.
const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// How many expired holds one reaper tick processes.
const REAP_BATCH: i64 = 100;

/// Engine tuning knobs. Non-positive values fall back to the defaults.
#[derive(Debug, Clone)]
pub struct InventoryEngineConfig {
    pub shard_count: usize,
    pub wal_buffer: usize,
    pub snapshot_interval: Duration,
    pub snapshot_ops_threshold: i64,
}

impl Default for InventoryEngineConfig {
    fn default() -> Self {
        Self {
            shard_count: 32,
            wal_buffer: 4096,
            snapshot_interval: Duration::from_secs(10),
            snapshot_ops_threshold: 500,
        }
    }
}

/// The inventory reservation engine.
pub struct InventoryService {
    manager: PartitionManager,
    wal: Arc<dyn WalStore>,
    snapshots: Arc<dyn SnapshotStore>,
    holds: Arc<dyn HoldTtlStore>,
    producer: Arc<dyn EventStreamProducer>,
    wal_rx: Mutex<Option<mpsc::Receiver<MutationRecord>>>,
    op_counter: AtomicI64,
    wal_append_failures: AtomicU64,
    snapshot_interval: Duration,
    snapshot_ops_threshold: i64,
}

impl InventoryService {
    pub fn new(
        cfg: InventoryEngineConfig,
        wal: Arc<dyn WalStore>,
        snapshots: Arc<dyn SnapshotStore>,
        holds: Arc<dyn HoldTtlStore>,
        producer: Arc<dyn EventStreamProducer>,
    ) -> Arc<Self> {
        let wal_buffer = if cfg.wal_buffer == 0 { 4096 } else { cfg.wal_buffer };
        let snapshot_ops_threshold = if cfg.snapshot_ops_threshold <= 0 {
            500
        } else {
            cfg.snapshot_ops_threshold
        };
        let (wal_tx, wal_rx) = mpsc::channel(wal_buffer);
        Arc::new(Self {
            manager: PartitionManager::new(cfg.shard_count, wal_tx),
            wal,
            snapshots,
            holds,
            producer,
            wal_rx: Mutex::new(Some(wal_rx)),
            op_counter: AtomicI64::new(0),
            wal_append_failures: AtomicU64::new(0),
            snapshot_interval: cfg.snapshot_interval,
            snapshot_ops_threshold,
        })
    }

    /// Recovers state and spawns the background loops.
    pub async fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), DomainError> {
        self.recover().await?;

        let wal_rx = self
            .wal_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| DomainError::internal("inventory service already started"))?;

        let svc = Arc::clone(self);
        let wal_shutdown = shutdown.clone();
        tokio::spawn(async move { svc.wal_writer_loop(wal_rx, wal_shutdown).await });

        let svc = Arc::clone(self);
        let snap_shutdown = shutdown.clone();
        tokio::spawn(async move { svc.snapshot_loop(snap_shutdown).await });

        let svc = Arc::clone(self);
        tokio::spawn(async move { svc.ttl_reaper_loop(shutdown).await });

        Ok(())
    }

    /// Loads snapshots and replays WAL records newer than each snapshot.
    ///
    /// Runs before the loops start, so no commands race the rebuild.
    pub async fn recover(&self) -> Result<(), DomainError> {
        let snapshots = self.snapshots.load_all().await?;
        let mut snapshot_seq: HashMap<String, i64> = HashMap::with_capacity(snapshots.len());
        let snapshot_count = snapshots.len();
        for snapshot in snapshots {
            snapshot_seq.insert(snapshot.partition_key.clone(), snapshot.snapshot_seq);
            self.manager.restore_state(snapshot.state).await?;
        }

        let records = self.wal.load_all().await?;
        let wal_count = records.len();
        for record in records {
            let seen = snapshot_seq
                .get(&record.partition_key)
                .copied()
                .unwrap_or(0);
            if record.seq <= seen {
                continue;
            }
            self.manager.apply_recovered(record).await?;
        }

        tracing::info!(
            snapshot_count,
            wal_count,
            "inventory recovery finished"
        );
        Ok(())
    }

    /// Places a hold and registers its TTL. When the TTL store refuses the
    /// hold the in-memory reservation is compensated away, so a hold never
    /// exists without an expiry.
    pub async fn try_hold(&self, cmd: TryHoldCommand) -> Result<PartitionState, DomainError> {
        let value = HoldTtlValue {
            partition_key: cmd.partition_key.clone(),
            hold_id: cmd.hold_id.clone(),
            qty: cmd.qty,
        };
        let state = self.manager.try_hold(cmd).await?;

        if let Err(err) = self.holds.save(&value).await {
            let _ = self
                .manager
                .release_hold(&value.partition_key, &value.hold_id)
                .await;
            let _ = self.holds.remove(&value.hold_id).await;
            return Err(DomainError::dependency(format!(
                "hold ttl save failed: {}",
                err
            )));
        }

        self.op_counter.fetch_add(1, Ordering::Relaxed);
        Ok(state)
    }

    pub async fn release_hold(
        &self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let state = self.manager.release_hold(partition_key, hold_id).await?;
        let _ = self.holds.remove(hold_id).await;
        self.op_counter.fetch_add(1, Ordering::Relaxed);
        Ok(state)
    }

    pub async fn confirm_hold(
        &self,
        partition_key: &str,
        hold_id: &str,
    ) -> Result<PartitionState, DomainError> {
        let state = self.manager.confirm_hold(partition_key, hold_id).await?;
        let _ = self.holds.remove(hold_id).await;
        self.op_counter.fetch_add(1, Ordering::Relaxed);
        Ok(state)
    }

    pub async fn get_availability(
        &self,
        partition_key: &str,
    ) -> Result<Option<i64>, DomainError> {
        self.manager.get_availability(partition_key).await
    }

    /// Operations accepted since the last successful snapshot pass.
    pub fn ops_since_snapshot(&self) -> i64 {
        self.op_counter.load(Ordering::Relaxed)
    }

    /// WAL records that could not be appended (lost from the log).
    pub fn wal_append_failures(&self) -> u64 {
        self.wal_append_failures.load(Ordering::Relaxed)
    }

    async fn wal_writer_loop(
        &self,
        mut rx: mpsc::Receiver<MutationRecord>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                maybe_record = rx.recv() => {
                    match maybe_record {
                        Some(record) => self.write_wal_record(record).await,
                        None => return,
                    }
                }
            }
        }
    }

    /// Persists one mutation record and publishes it to `inventory.events`.
    ///
    /// An append failure leaves the in-memory state ahead of the log; the
    /// failure counter makes that visible to operators. The loop continues
    /// either way.
    pub async fn write_wal_record(&self, record: MutationRecord) {
        let append = time::timeout(IO_TIMEOUT, self.wal.append(&record)).await;
        match append {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let total = self.wal_append_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(
                    error = %err,
                    partition_key = %record.partition_key,
                    seq = record.seq,
                    wal_append_failures = total,
                    "wal append failed"
                );
                return;
            }
            Err(_) => {
                let total = self.wal_append_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(
                    partition_key = %record.partition_key,
                    seq = record.seq,
                    wal_append_failures = total,
                    "wal append timed out"
                );
                return;
            }
        }

        let envelope = match mutation_envelope(&record) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(error = %err, seq = record.seq, "encode inventory event failed");
                return;
            }
        };
        let publish = time::timeout(
            IO_TIMEOUT,
            self.producer.publish(
                INVENTORY_EVENTS_STREAM,
                &record.partition_key,
                &envelope,
            ),
        )
        .await;
        match publish {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(
                    error = %err,
                    partition_key = %record.partition_key,
                    seq = record.seq,
                    "publish inventory event failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    partition_key = %record.partition_key,
                    seq = record.seq,
                    "publish inventory event timed out"
                );
            }
        }
    }

    async fn snapshot_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.snapshot_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.snapshot_tick().await;
                }
            }
        }
    }

    /// One snapshot-loop tick: persist when the op counter reached the
    /// threshold, resetting it only after a fully successful pass so a
    /// partial failure is retried on the next tick.
    pub async fn snapshot_tick(&self) {
        if self.op_counter.load(Ordering::Relaxed) < self.snapshot_ops_threshold {
            return;
        }
        match self.persist_snapshots().await {
            Ok(count) => {
                self.op_counter.store(0, Ordering::Relaxed);
                tracing::debug!(count, "partition snapshots persisted");
            }
            Err(err) => {
                tracing::error!(error = %err, "periodic snapshot failed");
            }
        }
    }

    /// Exports every partition state and upserts it with
    /// `snapshot_seq = last_seq`. Returns the first failure.
    pub async fn persist_snapshots(&self) -> Result<usize, DomainError> {
        let states = self.manager.export_snapshots().await?;
        let count = states.len();
        for state in states {
            let record = SnapshotRecord::from_state(state);
            time::timeout(IO_TIMEOUT, self.snapshots.upsert(&record))
                .await
                .map_err(|_| DomainError::dependency("snapshot upsert timed out"))??;
        }
        Ok(count)
    }

    async fn ttl_reaper_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.reap_expired_holds().await;
                }
            }
        }
    }

    /// One reaper tick: release every expired hold, then drop its
    /// delay-queue entry. A `hold_not_found` release counts as done (the
    /// hold was confirmed or released through the API first). Any other
    /// failure keeps the entry so a later poll retries.
    pub async fn reap_expired_holds(&self) -> usize {
        let expired = match self.holds.poll_expired(REAP_BATCH).await {
            Ok(expired) => expired,
            Err(err) => {
                tracing::error!(error = %err, "poll expired holds failed");
                return 0;
            }
        };

        let mut released = 0;
        for hold in expired {
            match self
                .release_hold(&hold.partition_key, &hold.hold_id)
                .await
            {
                Ok(_) => released += 1,
                Err(err) if err.code == ErrorCode::HoldNotFound => {}
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        hold_id = %hold.hold_id,
                        "release expired hold failed"
                    );
                    continue;
                }
            }
            if let Err(err) = self.holds.remove(&hold.hold_id).await {
                tracing::error!(error = %err, hold_id = %hold.hold_id, "remove expired hold failed");
            }
        }
        released
    }
}

/// Builds the `inventory.events` envelope for a mutation record.
fn mutation_envelope(record: &MutationRecord) -> Result<Vec<u8>, DomainError> {
    let payload = serde_json::to_value(&record.payload)?;
    EventEnvelope::new(
        record.partition_key.clone(),
        record.event_type.clone(),
        record.occurred_at,
        payload,
    )
    .to_bytes()
}
