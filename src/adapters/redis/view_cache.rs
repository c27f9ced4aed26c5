//! Redis implementation of the ViewCache port.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::DomainError;
use crate::domain::query::OrderView;
use crate::ports::ViewCache;

/// Default cache entry lifetime.
pub const VIEW_CACHE_TTL: Duration = Duration::from_secs(30);

fn cache_key(order_id: &str) -> String {
    format!("query:order:{}", order_id)
}

pub struct RedisViewCache {
    conn: MultiplexedConnection,
    ttl: Duration,
}

impl RedisViewCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            ttl: VIEW_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl ViewCache for RedisViewCache {
    async fn get_order_view(&self, order_id: &str) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = redis::cmd("GET")
            .arg(cache_key(order_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("cache read failed: {}", e)))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_slice(&raw) {
            Ok(view) => Ok(Some(view)),
            Err(err) => {
                // A corrupt entry is a miss, not a failure.
                tracing::debug!(error = %err, order_id, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    async fn set_order_view(&self, view: &OrderView) -> Result<(), DomainError> {
        let raw = serde_json::to_vec(view)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(cache_key(&view.order_id))
            .arg(raw)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("cache write failed: {}", e)))
    }

    async fn invalidate_order_view(&self, order_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(cache_key(order_id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("cache invalidate failed: {}", e)))
    }
}
