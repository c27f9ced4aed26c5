//! Inventory engine configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::inventory::InventoryEngineConfig;

/// Inventory engine tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Number of single-writer shards.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// WAL queue capacity; a full queue surfaces as backpressure.
    #[serde(default = "default_wal_buffer")]
    pub wal_buffer: usize,

    /// Snapshot loop tick in seconds.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    /// Accepted operations required before a snapshot pass runs.
    #[serde(default = "default_snapshot_ops_threshold")]
    pub snapshot_ops_threshold: i64,

    /// Hold TTL in seconds.
    #[serde(default = "default_hold_ttl_secs")]
    pub hold_ttl_secs: u64,
}

impl InventoryConfig {
    pub fn engine_config(&self) -> InventoryEngineConfig {
        InventoryEngineConfig {
            shard_count: self.shard_count,
            wal_buffer: self.wal_buffer,
            snapshot_interval: Duration::from_secs(self.snapshot_interval_secs.max(1)),
            snapshot_ops_threshold: self.snapshot_ops_threshold,
        }
    }

    pub fn hold_ttl(&self) -> Duration {
        Duration::from_secs(self.hold_ttl_secs.max(1))
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            wal_buffer: default_wal_buffer(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            snapshot_ops_threshold: default_snapshot_ops_threshold(),
            hold_ttl_secs: default_hold_ttl_secs(),
        }
    }
}

fn default_shard_count() -> usize {
    32
}

fn default_wal_buffer() -> usize {
    4096
}

fn default_snapshot_interval_secs() -> u64 {
    10
}

fn default_snapshot_ops_threshold() -> i64 {
    500
}

fn default_hold_ttl_secs() -> u64 {
    120
}
