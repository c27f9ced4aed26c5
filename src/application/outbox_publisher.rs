//! OutboxPublisher - background drain of an outbox table to an event stream.
//!
//! Second half of the transactional outbox pattern: command handlers write
//! rows inside their own DB transaction, this loop publishes them.
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 500ms | How often to scan for due rows |
//! | `batch_size` | 100 | Max rows published per cycle |
//!
//! Failed publishes are rescheduled with exponential backoff
//! (`1s, 1s, 2s, 4s, ... capped at 32s`) and a truncated error message, so
//! a broken broker never wedges the loop. Delivery is at-least-once;
//! consumers dedupe by `event_id`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::EventEnvelope;
use crate::ports::{EventStreamProducer, OutboxEvent, OutboxStore};

/// Deadline for one publish attempt.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum stored length of a publish error message.
const MAX_ERROR_LEN: usize = 240;

/// Configuration for the publisher loop.
#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 100,
        }
    }
}

/// Background service that publishes events from one outbox table to one
/// stream, keyed by `aggregate_id`.
pub struct OutboxPublisher {
    outbox: Arc<dyn OutboxStore>,
    producer: Arc<dyn EventStreamProducer>,
    stream: String,
    config: OutboxPublisherConfig,
}

impl OutboxPublisher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        producer: Arc<dyn EventStreamProducer>,
        stream: impl Into<String>,
    ) -> Self {
        Self {
            outbox,
            producer,
            stream: stream.into(),
            config: OutboxPublisherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OutboxPublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the publisher loop until the shutdown signal flips. The current
    /// batch finishes before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.publish_batch().await;
                        return;
                    }
                }
                _ = interval.tick() => {
                    self.publish_batch().await;
                }
            }
        }
    }

    /// Publishes one batch of due rows. Returns how many were published.
    pub async fn publish_batch(&self) -> usize {
        let events = match self.outbox.list_due(self.config.batch_size).await {
            Ok(events) => events,
            Err(err) => {
                tracing::error!(error = %err, stream = %self.stream, "load pending outbox failed");
                return 0;
            }
        };

        let mut published = 0;
        for event in events {
            match self.publish_one(&event).await {
                Ok(()) => {
                    published += 1;
                    if let Err(err) = self.outbox.mark_published(event.id).await {
                        tracing::error!(
                            error = %err,
                            event_id = %event.event_id,
                            "mark outbox published failed"
                        );
                    }
                }
                Err(cause) => {
                    tracing::error!(
                        error = %cause,
                        event_id = %event.event_id,
                        stream = %self.stream,
                        "publish outbox event failed"
                    );
                    self.schedule_retry(&event, &cause).await;
                }
            }
        }
        published
    }

    async fn publish_one(&self, event: &OutboxEvent) -> Result<(), String> {
        let envelope = EventEnvelope::with_event_id(
            event.event_id.clone(),
            event.aggregate_id.clone(),
            event.event_type.clone(),
            event.created_at,
            event.payload.clone(),
        );
        let raw = envelope.to_bytes().map_err(|e| e.to_string())?;

        match time::timeout(
            PUBLISH_TIMEOUT,
            self.producer.publish(&self.stream, &event.aggregate_id, &raw),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("publish timed out".to_string()),
        }
    }

    async fn schedule_retry(&self, event: &OutboxEvent, cause: &str) {
        let retry_count = event.retry_count + 1;
        let next_retry_at = Utc::now()
            + chrono::Duration::from_std(retry_backoff(retry_count))
                .unwrap_or_else(|_| chrono::Duration::seconds(1));
        if let Err(err) = self
            .outbox
            .mark_retry(
                event.id,
                retry_count,
                next_retry_at,
                truncate_error(cause, MAX_ERROR_LEN),
            )
            .await
        {
            tracing::error!(
                error = %err,
                event_id = %event.event_id,
                "mark outbox retry failed"
            );
        }
    }
}

/// Exponential publish backoff: `2^(min(n, 6) - 1)` seconds, one second for
/// the zeroth attempt.
pub fn retry_backoff(retry_count: i32) -> Duration {
    if retry_count <= 0 {
        return Duration::from_secs(1);
    }
    let capped = retry_count.min(6) as u32;
    Duration::from_secs(1 << (capped - 1))
}

/// Trims an error message to at most `max_len` bytes on a char boundary.
pub fn truncate_error(message: &str, max_len: usize) -> &str {
    let trimmed = message.trim();
    if trimmed.len() <= max_len {
        return trimmed;
    }
    let mut end = max_len;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    &trimmed[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::DomainError;
    use crate::ports::OutboxStatus;
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestOutbox {
        due: Mutex<Vec<OutboxEvent>>,
        published_ids: Mutex<Vec<i64>>,
        retries: Mutex<Vec<(i64, i32, DateTime<Utc>, String)>>,
    }

    impl TestOutbox {
        fn add_due(&self, id: i64, retry_count: i32) {
            self.due.lock().unwrap().push(OutboxEvent {
                id,
                event_id: format!("evt-{}", id),
                aggregate_id: "order-1".to_string(),
                event_type: "OrderCreated".to_string(),
                payload: json!({"order_id": "order-1"}),
                status: OutboxStatus::Pending,
                retry_count,
                next_retry_at: Utc::now(),
                created_at: Utc::now(),
                published_at: None,
                last_error: None,
            });
        }
    }

    #[async_trait::async_trait]
    impl OutboxStore for TestOutbox {
        async fn list_due(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError> {
            let mut due = self.due.lock().unwrap();
            let take = (limit as usize).min(due.len());
            Ok(due.drain(..take).collect())
        }

        async fn mark_published(&self, id: i64) -> Result<(), DomainError> {
            self.published_ids.lock().unwrap().push(id);
            Ok(())
        }

        async fn mark_retry(
            &self,
            id: i64,
            retry_count: i32,
            next_retry_at: DateTime<Utc>,
            last_error: &str,
        ) -> Result<(), DomainError> {
            self.retries
                .lock()
                .unwrap()
                .push((id, retry_count, next_retry_at, last_error.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestProducer {
        published: Mutex<Vec<(String, String, Vec<u8>)>>,
        fail: AtomicBool,
    }

    #[async_trait::async_trait]
    impl crate::ports::EventStreamProducer for TestProducer {
        async fn publish(
            &self,
            stream: &str,
            key: &str,
            payload: &[u8],
        ) -> Result<(), DomainError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DomainError::dependency("broker down"));
            }
            self.published
                .lock()
                .unwrap()
                .push((stream.to_string(), key.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn publishes_due_events_as_envelopes() {
        let outbox = Arc::new(TestOutbox::default());
        let producer = Arc::new(TestProducer::default());
        outbox.add_due(1, 0);
        outbox.add_due(2, 0);

        let publisher = OutboxPublisher::new(outbox.clone(), producer.clone(), "order.events");
        let count = publisher.publish_batch().await;

        assert_eq!(count, 2);
        assert_eq!(*outbox.published_ids.lock().unwrap(), vec![1, 2]);

        let published = producer.published.lock().unwrap();
        let (stream, key, raw) = &published[0];
        assert_eq!(stream, "order.events");
        assert_eq!(key, "order-1");
        let envelope = EventEnvelope::from_slice(raw).unwrap();
        assert_eq!(envelope.event_id, "evt-1");
        assert_eq!(envelope.event_type, "OrderCreated");
        assert_eq!(envelope.payload["order_id"], "order-1");
    }

    #[tokio::test]
    async fn failed_publish_schedules_backoff_retry() {
        let outbox = Arc::new(TestOutbox::default());
        let producer = Arc::new(TestProducer::default());
        producer.fail.store(true, Ordering::SeqCst);
        outbox.add_due(7, 2);

        let publisher = OutboxPublisher::new(outbox.clone(), producer, "order.events");
        let before = Utc::now();
        let count = publisher.publish_batch().await;

        assert_eq!(count, 0);
        let retries = outbox.retries.lock().unwrap();
        let (id, retry_count, next_retry_at, last_error) = &retries[0];
        assert_eq!(*id, 7);
        assert_eq!(*retry_count, 3);
        // backoff(3) = 4s
        assert!(*next_retry_at >= before + chrono::Duration::seconds(3));
        assert!(last_error.contains("broker down"));
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let outbox = Arc::new(TestOutbox::default());
        let producer = Arc::new(TestProducer::default());
        let publisher = OutboxPublisher::new(outbox, producer, "order.events");
        assert_eq!(publisher.publish_batch().await, 0);
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let outbox = Arc::new(TestOutbox::default());
        let producer = Arc::new(TestProducer::default());
        outbox.add_due(1, 0);

        let publisher = OutboxPublisher::new(outbox.clone(), producer, "order.events")
            .with_config(OutboxPublisherConfig {
                poll_interval: Duration::from_millis(10),
                batch_size: 100,
            });

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { publisher.run(rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(*outbox.published_ids.lock().unwrap(), vec![1]);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(1), Duration::from_secs(1));
        assert_eq!(retry_backoff(2), Duration::from_secs(2));
        assert_eq!(retry_backoff(3), Duration::from_secs(4));
        assert_eq!(retry_backoff(6), Duration::from_secs(32));
        assert_eq!(retry_backoff(7), Duration::from_secs(32));
        assert_eq!(retry_backoff(100), Duration::from_secs(32));
    }

    #[test]
    fn truncate_error_trims_and_caps() {
        assert_eq!(truncate_error("  short  ", 240), "short");
        let long = "x".repeat(500);
        assert_eq!(truncate_error(&long, 240).len(), 240);
    }
}
