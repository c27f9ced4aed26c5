//! Redis implementation of the HoldTtlStore port.
//!
//! Layout:
//! - `inventory:hold:<hold_id>` - JSON value with a wall-clock TTL,
//! - `inventory:holds:delay_queue` - sorted set of hold ids scored by the
//!   absolute expiry time (unix seconds).
//!
//! Writes pipeline both keys atomically. `poll_expired` range-scans
//! `[-inf, now]`; ids whose value key already expired are pruned from the
//! queue and skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::DomainError;
use crate::ports::{HoldTtlStore, HoldTtlValue};

const DELAY_QUEUE_KEY: &str = "inventory:holds:delay_queue";
const HOLD_KEY_PREFIX: &str = "inventory:hold:";

pub struct RedisHoldTtlStore {
    conn: MultiplexedConnection,
    ttl: Duration,
}

impl RedisHoldTtlStore {
    pub fn new(conn: MultiplexedConnection, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

fn hold_key(hold_id: &str) -> String {
    format!("{}{}", HOLD_KEY_PREFIX, hold_id)
}

fn redis_error(context: &str, err: redis::RedisError) -> DomainError {
    DomainError::cache(format!("{}: {}", context, err))
}

#[async_trait]
impl HoldTtlStore for RedisHoldTtlStore {
    async fn save(&self, value: &HoldTtlValue) -> Result<(), DomainError> {
        let raw = serde_json::to_vec(value)?;
        let ttl_secs = self.ttl.as_secs().max(1);
        let expire_at = Utc::now().timestamp() + ttl_secs as i64;

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(hold_key(&value.hold_id))
            .arg(raw)
            .arg("EX")
            .arg(ttl_secs)
            .ignore()
            .cmd("ZADD")
            .arg(DELAY_QUEUE_KEY)
            .arg(expire_at)
            .arg(&value.hold_id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| redis_error("save hold failed", e))
    }

    async fn remove(&self, hold_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(hold_key(hold_id))
            .ignore()
            .cmd("ZREM")
            .arg(DELAY_QUEUE_KEY)
            .arg(hold_id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| redis_error("remove hold failed", e))
    }

    async fn poll_expired(&self, limit: i64) -> Result<Vec<HoldTtlValue>, DomainError> {
        let now = Utc::now().timestamp();
        let mut conn = self.conn.clone();
        let ids: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(DELAY_QUEUE_KEY)
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("poll delay queue failed", e))?;

        let mut values = Vec::with_capacity(ids.len());
        for hold_id in ids {
            let raw: Option<Vec<u8>> = redis::cmd("GET")
                .arg(hold_key(&hold_id))
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error("read hold value failed", e))?;
            match raw {
                Some(raw) => {
                    let value: HoldTtlValue = serde_json::from_slice(&raw).map_err(|e| {
                        DomainError::cache(format!("decode hold value failed: {}", e))
                    })?;
                    values.push(value);
                }
                None => {
                    // The per-hold key outlived its TTL; drop the stale
                    // queue entry and move on.
                    let _: Result<i64, _> = redis::cmd("ZREM")
                        .arg(DELAY_QUEUE_KEY)
                        .arg(&hold_id)
                        .query_async(&mut conn)
                        .await;
                }
            }
        }
        Ok(values)
    }
}
