//! Redis Streams adapters for the event stream ports.
//!
//! Each logical stream (`inventory.events`, `order.events`,
//! `ticket.events`) is one Redis stream. A stream is totally ordered, which
//! preserves the per-key ordering the producers rely on. Consumers use
//! consumer groups: `XREADGROUP` to fetch, `XACK` as the manual commit.
//! Entries fetched but never acked stay in the group's pending list and are
//! re-read on the next start, giving at-least-once delivery.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use crate::domain::foundation::DomainError;
use crate::ports::{EventStreamConsumer, EventStreamProducer, StreamMessage};

/// Field under which the envelope bytes are stored in a stream entry.
const PAYLOAD_FIELD: &str = "payload";
/// Field carrying the partitioning key, for stream introspection.
const KEY_FIELD: &str = "key";

/// How long a fetch blocks waiting for a new entry, in milliseconds.
const BLOCK_MILLIS: usize = 1000;

fn stream_error(context: &str, err: redis::RedisError) -> DomainError {
    DomainError::dependency(format!("{}: {}", context, err))
}

/// XADD-based producer shared by every publishing loop.
#[derive(Clone)]
pub struct RedisStreamProducer {
    conn: MultiplexedConnection,
}

impl RedisStreamProducer {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventStreamProducer for RedisStreamProducer {
    async fn publish(&self, stream: &str, key: &str, payload: &[u8]) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::cmd("XADD")
            .arg(stream)
            .arg("*")
            .arg(KEY_FIELD)
            .arg(key)
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| stream_error("xadd failed", e))?;
        Ok(())
    }
}

/// Consumer-group reader over one stream.
pub struct RedisStreamConsumer {
    conn: MultiplexedConnection,
    stream: String,
    group: String,
    consumer: String,
    /// While set, reads start at "0" to drain entries delivered but not
    /// acked before the last restart.
    backlog: AtomicBool,
}

impl RedisStreamConsumer {
    /// Creates the consumer group (idempotently) and returns a consumer.
    pub async fn new(
        conn: MultiplexedConnection,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let stream = stream.into();
        let group = group.into();

        let mut setup = conn.clone();
        let created: Result<(), redis::RedisError> = setup
            .xgroup_create_mkstream(&stream, &group, "0")
            .await;
        if let Err(err) = created {
            // BUSYGROUP means the group already exists, which is fine.
            if !err.to_string().contains("BUSYGROUP") {
                return Err(stream_error("create consumer group failed", err));
            }
        }

        Ok(Self {
            conn,
            stream,
            group,
            consumer: consumer.into(),
            backlog: AtomicBool::new(true),
        })
    }

    fn message_from_reply(reply: StreamReadReply) -> Option<StreamMessage> {
        let entry = reply.keys.into_iter().next()?.ids.into_iter().next()?;
        let payload: Vec<u8> = entry.get(PAYLOAD_FIELD)?;
        Some(StreamMessage {
            id: entry.id,
            payload,
        })
    }
}

#[async_trait]
impl EventStreamConsumer for RedisStreamConsumer {
    async fn fetch(&self) -> Result<Option<StreamMessage>, DomainError> {
        let mut conn = self.conn.clone();

        if self.backlog.load(Ordering::Acquire) {
            let options = StreamReadOptions::default()
                .group(&self.group, &self.consumer)
                .count(1);
            let reply: StreamReadReply = conn
                .xread_options(&[&self.stream], &["0"], &options)
                .await
                .map_err(|e| stream_error("xreadgroup backlog failed", e))?;
            match Self::message_from_reply(reply) {
                Some(message) => return Ok(Some(message)),
                None => self.backlog.store(false, Ordering::Release),
            }
        }

        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1)
            .block(BLOCK_MILLIS);
        let reply: StreamReadReply = conn
            .xread_options(&[&self.stream], &[">"], &options)
            .await
            .map_err(|e| stream_error("xreadgroup failed", e))?;
        Ok(Self::message_from_reply(reply))
    }

    async fn commit(&self, message: &StreamMessage) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(&self.stream, &self.group, &[&message.id])
            .await
            .map_err(|e| stream_error("xack failed", e))?;
        Ok(())
    }
}
