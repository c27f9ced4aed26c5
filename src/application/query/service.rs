//! Query service: read-model projector and cached view reads.
//!
//! Two manual-commit consumer loops keep `query_order_view` current, one
//! per stream. The contract is fetch -> handle -> commit: a handler error
//! leaves the message uncommitted so the broker re-delivers it, and the
//! `consumed_events` ledger (inside the projection transaction) makes the
//! redelivery a no-op.
//!
//! View reads go through a short-TTL cache; the projector invalidates the
//! cached entry after every successful projection.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::domain::order::OrderStatus;
use crate::domain::query::OrderView;
use crate::ports::{EventStreamConsumer, OrderViewStore, OrderViewUpdate, ViewCache};

/// Consumer name recorded in the idempotence ledger.
pub const QUERY_CONSUMER: &str = "query-service";

/// How many orders the cold-start rebuild copies into the view.
pub const COLD_START_REBUILD_LIMIT: i64 = 10_000;

/// Pause after a failed fetch before retrying.
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Deadline for committing a consumed message.
const COMMIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Which stream a consume loop serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    OrderEvents,
    TicketEvents,
}

pub struct QueryService {
    views: Arc<dyn OrderViewStore>,
    cache: Arc<dyn ViewCache>,
    consumer_name: String,
}

impl QueryService {
    pub fn new(views: Arc<dyn OrderViewStore>, cache: Arc<dyn ViewCache>) -> Self {
        Self {
            views,
            cache,
            consumer_name: QUERY_CONSUMER.to_string(),
        }
    }

    /// Cache read-through for one order view.
    pub async fn get_order_view(&self, order_id: &str) -> Result<OrderView, DomainError> {
        if let Ok(Some(view)) = self.cache.get_order_view(order_id).await {
            return Ok(view);
        }
        let view = self.views.get(order_id).await?;
        let _ = self.cache.set_order_view(&view).await;
        Ok(view)
    }

    /// Bounded rebuild of the view after catastrophic loss.
    pub async fn rebuild_cold_start(&self) -> Result<u64, DomainError> {
        self.views.rebuild_from_orders(COLD_START_REBUILD_LIMIT).await
    }

    /// Consumes `order.events` until shutdown.
    pub async fn run_order_events(
        &self,
        consumer: Arc<dyn EventStreamConsumer>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.consume_loop(consumer, StreamKind::OrderEvents, shutdown)
            .await
    }

    /// Consumes `ticket.events` until shutdown.
    pub async fn run_ticket_events(
        &self,
        consumer: Arc<dyn EventStreamConsumer>,
        shutdown: watch::Receiver<bool>,
    ) {
        self.consume_loop(consumer, StreamKind::TicketEvents, shutdown)
            .await
    }

    async fn consume_loop(
        &self,
        consumer: Arc<dyn EventStreamConsumer>,
        kind: StreamKind,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                fetched = consumer.fetch() => {
                    match fetched {
                        Ok(Some(message)) => {
                            let handled = match kind {
                                StreamKind::OrderEvents => {
                                    self.handle_order_event(&message.payload).await
                                }
                                StreamKind::TicketEvents => {
                                    self.handle_ticket_event(&message.payload).await
                                }
                            };
                            match handled {
                                Ok(()) => {
                                    let commit = time::timeout(
                                        COMMIT_TIMEOUT,
                                        consumer.commit(&message),
                                    )
                                    .await;
                                    match commit {
                                        Ok(Ok(())) => {}
                                        Ok(Err(err)) => tracing::error!(
                                            error = %err,
                                            ?kind,
                                            "query consumer commit failed"
                                        ),
                                        Err(_) => tracing::error!(
                                            ?kind,
                                            "query consumer commit timed out"
                                        ),
                                    }
                                }
                                Err(err) => {
                                    // No commit: the message will be re-delivered.
                                    tracing::error!(
                                        error = %err,
                                        ?kind,
                                        "query consumer handle failed"
                                    );
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::error!(error = %err, ?kind, "query consumer fetch failed");
                            time::sleep(FETCH_RETRY_DELAY).await;
                        }
                    }
                }
            }
        }
    }

    /// Projects one `order.events` message into the view.
    pub async fn handle_order_event(&self, raw: &[u8]) -> Result<(), DomainError> {
        let envelope = EventEnvelope::from_slice(raw)?;
        let update = map_order_event(&envelope.event_type, &envelope.aggregate_id, &envelope.payload);
        let applied = self
            .views
            .project_order_event(&envelope.event_id, &self.consumer_name, update.as_ref())
            .await?;
        if applied && update.is_some() {
            let _ = self.cache.invalidate_order_view(&envelope.aggregate_id).await;
        }
        Ok(())
    }

    /// Projects one `ticket.events` message into the view.
    pub async fn handle_ticket_event(&self, raw: &[u8]) -> Result<(), DomainError> {
        let envelope = EventEnvelope::from_slice(raw)?;
        if envelope.event_type != "TicketIssued" {
            return Ok(());
        }
        let seat_no = extract_seat_no(&envelope.payload);
        let applied = self
            .views
            .project_ticket_event(
                &envelope.event_id,
                &self.consumer_name,
                &envelope.aggregate_id,
                &seat_no,
            )
            .await?;
        if applied {
            let _ = self.cache.invalidate_order_view(&envelope.aggregate_id).await;
        }
        Ok(())
    }
}

/// Maps an order event type to its view update. Unknown types project
/// nothing (the event is still recorded in the ledger).
fn map_order_event(
    event_type: &str,
    order_id: &str,
    payload: &JsonValue,
) -> Option<OrderViewUpdate> {
    let (status, amount_cents, provider_txn_id) = match event_type {
        "OrderCreated" => (
            OrderStatus::Init,
            payload["amount_cents"].as_i64().unwrap_or(0),
            String::new(),
        ),
        "OrderReserved" => (OrderStatus::Reserved, 0, String::new()),
        "OrderPaid" => (
            OrderStatus::Paid,
            0,
            payload["provider_txn_id"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        ),
        "OrderCancelled" => (OrderStatus::Cancelled, 0, String::new()),
        _ => return None,
    };
    Some(OrderViewUpdate {
        order_id: order_id.to_string(),
        status: status.as_str().to_string(),
        amount_cents,
        provider_txn_id,
    })
}

/// Pulls `seat_no` from the payload, falling back to a nested `payload`
/// object for producers that ship a full envelope as the payload.
fn extract_seat_no(payload: &JsonValue) -> String {
    if let Some(seat) = payload["seat_no"].as_str() {
        if !seat.is_empty() {
            return seat.to_string();
        }
    }
    payload["payload"]["seat_no"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestViewStore {
        views: Mutex<HashMap<String, OrderView>>,
        consumed: Mutex<HashSet<(String, String)>>,
        rebuilds: Mutex<Vec<i64>>,
    }

    impl TestViewStore {
        fn view(&self, order_id: &str) -> Option<OrderView> {
            self.views.lock().unwrap().get(order_id).cloned()
        }

        fn seed(&self, view: OrderView) {
            self.views
                .lock()
                .unwrap()
                .insert(view.order_id.clone(), view);
        }
    }

    #[async_trait::async_trait]
    impl OrderViewStore for TestViewStore {
        async fn get(&self, order_id: &str) -> Result<OrderView, DomainError> {
            self.view(order_id)
                .ok_or_else(|| DomainError::order_view_not_found(order_id))
        }

        async fn project_order_event(
            &self,
            event_id: &str,
            consumer: &str,
            update: Option<&OrderViewUpdate>,
        ) -> Result<bool, DomainError> {
            let mut consumed = self.consumed.lock().unwrap();
            if !consumed.insert((event_id.to_string(), consumer.to_string())) {
                return Ok(false);
            }
            if let Some(update) = update {
                let mut views = self.views.lock().unwrap();
                let entry = views
                    .entry(update.order_id.clone())
                    .or_insert_with(|| OrderView {
                        order_id: update.order_id.clone(),
                        status: update.status.clone(),
                        amount_cents: 0,
                        provider_txn_id: String::new(),
                        seat_no: String::new(),
                        updated_at: Utc::now(),
                    });
                entry.status = update.status.clone();
                if update.amount_cents > 0 {
                    entry.amount_cents = update.amount_cents;
                }
                if !update.provider_txn_id.is_empty() {
                    entry.provider_txn_id = update.provider_txn_id.clone();
                }
                entry.updated_at = Utc::now();
            }
            Ok(true)
        }

        async fn project_ticket_event(
            &self,
            event_id: &str,
            consumer: &str,
            order_id: &str,
            seat_no: &str,
        ) -> Result<bool, DomainError> {
            let mut consumed = self.consumed.lock().unwrap();
            if !consumed.insert((event_id.to_string(), consumer.to_string())) {
                return Ok(false);
            }
            let mut views = self.views.lock().unwrap();
            let entry = views.entry(order_id.to_string()).or_insert_with(|| OrderView {
                order_id: order_id.to_string(),
                status: String::new(),
                amount_cents: 0,
                provider_txn_id: String::new(),
                seat_no: String::new(),
                updated_at: Utc::now(),
            });
            entry.status = "TICKETED".to_string();
            entry.seat_no = seat_no.to_string();
            Ok(true)
        }

        async fn rebuild_from_orders(&self, limit: i64) -> Result<u64, DomainError> {
            self.rebuilds.lock().unwrap().push(limit);
            Ok(0)
        }
    }

    #[derive(Default)]
    struct TestCache {
        entries: Mutex<HashMap<String, OrderView>>,
        invalidated: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ViewCache for TestCache {
        async fn get_order_view(
            &self,
            order_id: &str,
        ) -> Result<Option<OrderView>, DomainError> {
            Ok(self.entries.lock().unwrap().get(order_id).cloned())
        }

        async fn set_order_view(&self, view: &OrderView) -> Result<(), DomainError> {
            self.entries
                .lock()
                .unwrap()
                .insert(view.order_id.clone(), view.clone());
            Ok(())
        }

        async fn invalidate_order_view(&self, order_id: &str) -> Result<(), DomainError> {
            self.entries.lock().unwrap().remove(order_id);
            self.invalidated.lock().unwrap().push(order_id.to_string());
            Ok(())
        }
    }

    struct Fixture {
        service: QueryService,
        views: Arc<TestViewStore>,
        cache: Arc<TestCache>,
    }

    fn fixture() -> Fixture {
        let views = Arc::new(TestViewStore::default());
        let cache = Arc::new(TestCache::default());
        let service = QueryService::new(views.clone(), cache.clone());
        Fixture {
            service,
            views,
            cache,
        }
    }

    fn event(event_id: &str, order_id: &str, event_type: &str, payload: JsonValue) -> Vec<u8> {
        EventEnvelope::with_event_id(event_id, order_id, event_type, Utc::now(), payload)
            .to_bytes()
            .unwrap()
    }

    #[tokio::test]
    async fn order_created_projects_init_with_amount() {
        let f = fixture();
        f.service
            .handle_order_event(&event(
                "e1",
                "o-1",
                "OrderCreated",
                json!({"amount_cents": 9900}),
            ))
            .await
            .unwrap();

        let view = f.views.view("o-1").unwrap();
        assert_eq!(view.status, "INIT");
        assert_eq!(view.amount_cents, 9900);
        assert_eq!(*f.cache.invalidated.lock().unwrap(), vec!["o-1"]);
    }

    #[tokio::test]
    async fn order_paid_merges_provider_txn_and_keeps_amount() {
        let f = fixture();
        f.service
            .handle_order_event(&event(
                "e1",
                "o-1",
                "OrderCreated",
                json!({"amount_cents": 9900}),
            ))
            .await
            .unwrap();
        f.service
            .handle_order_event(&event(
                "e2",
                "o-1",
                "OrderPaid",
                json!({"provider_txn_id": "txn-1"}),
            ))
            .await
            .unwrap();

        let view = f.views.view("o-1").unwrap();
        assert_eq!(view.status, "PAID");
        assert_eq!(view.amount_cents, 9900);
        assert_eq!(view.provider_txn_id, "txn-1");
    }

    #[tokio::test]
    async fn duplicate_event_id_is_skipped_without_invalidation() {
        let f = fixture();
        let raw = event("e1", "o-1", "OrderCreated", json!({"amount_cents": 100}));
        f.service.handle_order_event(&raw).await.unwrap();
        f.service
            .handle_order_event(&event(
                "e1",
                "o-1",
                "OrderCancelled",
                json!({}),
            ))
            .await
            .unwrap();

        let view = f.views.view("o-1").unwrap();
        assert_eq!(view.status, "INIT");
        assert_eq!(f.cache.invalidated.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_type_lands_in_ledger_only() {
        let f = fixture();
        f.service
            .handle_order_event(&event("e9", "o-1", "OrderAudited", json!({})))
            .await
            .unwrap();

        assert!(f.views.view("o-1").is_none());
        assert!(f.cache.invalidated.lock().unwrap().is_empty());
        // The ledger recorded it: a replay with the same id projects nothing.
        f.service
            .handle_order_event(&event("e9", "o-1", "OrderCreated", json!({"amount_cents": 5})))
            .await
            .unwrap();
        assert!(f.views.view("o-1").is_none());
    }

    #[tokio::test]
    async fn ticket_issued_sets_seat_and_status() {
        let f = fixture();
        f.service
            .handle_ticket_event(&event(
                "t1",
                "o-1",
                "TicketIssued",
                json!({"order_id": "o-1", "seat_no": "12A"}),
            ))
            .await
            .unwrap();

        let view = f.views.view("o-1").unwrap();
        assert_eq!(view.status, "TICKETED");
        assert_eq!(view.seat_no, "12A");
    }

    #[tokio::test]
    async fn ticket_handler_reads_nested_payload_seat() {
        let f = fixture();
        f.service
            .handle_ticket_event(&event(
                "t1",
                "o-1",
                "TicketIssued",
                json!({"payload": {"seat_no": "7F"}}),
            ))
            .await
            .unwrap();

        assert_eq!(f.views.view("o-1").unwrap().seat_no, "7F");
    }

    #[tokio::test]
    async fn ticket_handler_ignores_other_types() {
        let f = fixture();
        f.service
            .handle_ticket_event(&event("t1", "o-1", "TicketVoided", json!({})))
            .await
            .unwrap();
        assert!(f.views.view("o-1").is_none());
    }

    #[tokio::test]
    async fn get_order_view_reads_through_and_caches() {
        let f = fixture();
        let view = OrderView {
            order_id: "o-1".to_string(),
            status: "PAID".to_string(),
            amount_cents: 100,
            provider_txn_id: "txn-1".to_string(),
            seat_no: String::new(),
            updated_at: Utc::now(),
        };
        f.views.seed(view.clone());

        let got = f.service.get_order_view("o-1").await.unwrap();
        assert_eq!(got, view);
        assert!(f.cache.entries.lock().unwrap().contains_key("o-1"));

        // Second read is served from cache even if the store row changes.
        f.views.seed(OrderView {
            status: "CANCELLED".to_string(),
            ..view.clone()
        });
        let got = f.service.get_order_view("o-1").await.unwrap();
        assert_eq!(got.status, "PAID");
    }

    #[tokio::test]
    async fn get_order_view_maps_missing_to_not_found() {
        let f = fixture();
        let err = f.service.get_order_view("missing").await.unwrap_err();
        assert_eq!(
            err.code,
            crate::domain::foundation::ErrorCode::OrderViewNotFound
        );
    }

    #[tokio::test]
    async fn cold_start_rebuild_uses_the_bounded_limit() {
        let f = fixture();
        f.service.rebuild_cold_start().await.unwrap();
        assert_eq!(*f.views.rebuilds.lock().unwrap(), vec![COLD_START_REBUILD_LIMIT]);
    }

    #[test]
    fn map_order_event_covers_all_types() {
        let update = map_order_event("OrderCreated", "o-1", &json!({"amount_cents": 42})).unwrap();
        assert_eq!((update.status.as_str(), update.amount_cents), ("INIT", 42));

        let update = map_order_event("OrderReserved", "o-1", &json!({})).unwrap();
        assert_eq!(update.status, "RESERVED");

        let update =
            map_order_event("OrderPaid", "o-1", &json!({"provider_txn_id": "t"})).unwrap();
        assert_eq!((update.status.as_str(), update.provider_txn_id.as_str()), ("PAID", "t"));

        let update = map_order_event("OrderCancelled", "o-1", &json!({})).unwrap();
        assert_eq!(update.status, "CANCELLED");

        assert!(map_order_event("SomethingElse", "o-1", &json!({})).is_none());
    }

    #[test]
    fn extract_seat_prefers_top_level() {
        assert_eq!(
            extract_seat_no(&json!({"seat_no": "1A", "payload": {"seat_no": "2B"}})),
            "1A"
        );
        assert_eq!(extract_seat_no(&json!({"payload": {"seat_no": "2B"}})), "2B");
        assert_eq!(extract_seat_no(&json!({})), "");
    }
}
