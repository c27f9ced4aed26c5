//! End-to-end order lifecycle over in-memory infrastructure.
//!
//! Drives create -> reserve -> pay through the order service, hands the
//! resulting outbox rows to the ticket worker and the projector the same
//! way the publishers would, and checks the read model lands on
//! `TICKETED` with the allocated seat.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value as JsonValue;

use ticketd::application::order::{
    OrderService, OrderServiceConfig, PaymentCallbackRequest, ReserveOrderRequest,
};
use ticketd::application::query::QueryService;
use ticketd::application::ticket::TicketWorker;
use ticketd::domain::foundation::{DomainError, EventEnvelope};
use ticketd::domain::order::{sign_payload, Order, OrderStatus, Payment};
use ticketd::domain::query::OrderView;
use ticketd::domain::ticket::Ticket;
use ticketd::ports::{
    EventStreamConsumer, InsertOutcome, InventoryApi, OrderStore, OrderViewStore,
    OrderViewUpdate, OutboxInsert, PaymentOutcome, SeatAllocator, StreamMessage, TicketOutcome,
    TicketStore, TryHoldRequest, ViewCache,
};

const SIGN_KEY: &str = "lifecycle-key";

// =============================================================================
// In-memory order store with transactional semantics
// =============================================================================

#[derive(Default)]
struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
    payments: Mutex<HashMap<String, Payment>>,
    outbox: Mutex<Vec<OutboxInsert>>,
}

impl MemoryOrderStore {
    fn drain_outbox(&self) -> Vec<OutboxInsert> {
        std::mem::take(&mut *self.outbox.lock().unwrap())
    }

    fn set_status(&self, order_id: &str, status: OrderStatus) {
        self.orders
            .lock()
            .unwrap()
            .get_mut(order_id)
            .expect("order exists")
            .status = status;
    }
}

#[async_trait::async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, DomainError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| DomainError::order_not_found(order_id))
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, DomainError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.idempotency_key == key)
            .cloned())
    }

    async fn insert_with_outbox(
        &self,
        order: &Order,
        event: &OutboxInsert,
    ) -> Result<InsertOutcome, DomainError> {
        let mut orders = self.orders.lock().unwrap();
        if orders
            .values()
            .any(|o| o.idempotency_key == order.idempotency_key)
        {
            return Ok(InsertOutcome::DuplicateKey);
        }
        orders.insert(order.order_id.clone(), order.clone());
        self.outbox.lock().unwrap().push(event.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn transition_with_outbox(
        &self,
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        event: &OutboxInsert,
    ) -> Result<bool, DomainError> {
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(order_id) else {
            return Ok(false);
        };
        if order.status != from {
            return Ok(false);
        }
        order.status = to;
        self.outbox.lock().unwrap().push(event.clone());
        Ok(true)
    }

    async fn record_payment(
        &self,
        payment: &Payment,
        event: &OutboxInsert,
    ) -> Result<PaymentOutcome, DomainError> {
        let mut payments = self.payments.lock().unwrap();
        if payments.contains_key(&payment.provider_txn_id) {
            return Ok(PaymentOutcome::DuplicateTxn);
        }
        let mut orders = self.orders.lock().unwrap();
        let Some(order) = orders.get_mut(&payment.order_id) else {
            return Ok(PaymentOutcome::StatusConflict);
        };
        if order.status != OrderStatus::Reserved {
            return Ok(PaymentOutcome::StatusConflict);
        }
        payments.insert(payment.provider_txn_id.clone(), payment.clone());
        order.status = OrderStatus::Paid;
        self.outbox.lock().unwrap().push(event.clone());
        Ok(PaymentOutcome::Applied)
    }
}

// =============================================================================
// Remaining fakes
// =============================================================================

#[derive(Default)]
struct MemoryInventory {
    holds: Mutex<HashSet<String>>,
    try_holds: AtomicUsize,
}

#[async_trait::async_trait]
impl InventoryApi for MemoryInventory {
    async fn try_hold(&self, request: &TryHoldRequest) -> Result<(), DomainError> {
        self.try_holds.fetch_add(1, Ordering::SeqCst);
        self.holds.lock().unwrap().insert(request.hold_id.clone());
        Ok(())
    }

    async fn release_hold(&self, _pk: &str, hold_id: &str) -> Result<(), DomainError> {
        if !self.holds.lock().unwrap().remove(hold_id) {
            return Err(DomainError::hold_not_found());
        }
        Ok(())
    }

    async fn confirm_hold(&self, _pk: &str, hold_id: &str) -> Result<(), DomainError> {
        if !self.holds.lock().unwrap().remove(hold_id) {
            return Err(DomainError::hold_not_found());
        }
        Ok(())
    }
}

struct SharedTicketStore {
    orders: Arc<MemoryOrderStore>,
    tickets: Mutex<HashMap<String, Ticket>>,
    outbox: Mutex<Vec<OutboxInsert>>,
}

impl SharedTicketStore {
    fn new(orders: Arc<MemoryOrderStore>) -> Self {
        Self {
            orders,
            tickets: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
        }
    }

    fn drain_outbox(&self) -> Vec<OutboxInsert> {
        std::mem::take(&mut *self.outbox.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl TicketStore for SharedTicketStore {
    async fn issue_ticket(
        &self,
        ticket: &Ticket,
        event: &OutboxInsert,
    ) -> Result<TicketOutcome, DomainError> {
        let status = self
            .orders
            .orders
            .lock()
            .unwrap()
            .get(&ticket.order_id)
            .map(|o| o.status);
        if status != Some(OrderStatus::Paid) {
            return Ok(TicketOutcome::OrderNotPaid);
        }
        let mut tickets = self.tickets.lock().unwrap();
        if tickets.contains_key(&ticket.order_id) {
            return Ok(TicketOutcome::AlreadyIssued);
        }
        tickets.insert(ticket.order_id.clone(), ticket.clone());
        self.orders.set_status(&ticket.order_id, OrderStatus::Ticketed);
        self.outbox.lock().unwrap().push(event.clone());
        Ok(TicketOutcome::Issued)
    }
}

struct FixedSeatAllocator;

#[async_trait::async_trait]
impl SeatAllocator for FixedSeatAllocator {
    async fn allocate_seat(&self, order_id: &str) -> Result<String, DomainError> {
        Ok(format!("SEAT-{}", &order_id[..4.min(order_id.len())]))
    }
}

struct IdleConsumer;

#[async_trait::async_trait]
impl EventStreamConsumer for IdleConsumer {
    async fn fetch(&self) -> Result<Option<StreamMessage>, DomainError> {
        Ok(None)
    }

    async fn commit(&self, _message: &StreamMessage) -> Result<(), DomainError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryViewStore {
    views: Mutex<HashMap<String, OrderView>>,
    consumed: Mutex<HashSet<(String, String)>>,
}

#[async_trait::async_trait]
impl OrderViewStore for MemoryViewStore {
    async fn get(&self, order_id: &str) -> Result<OrderView, DomainError> {
        self.views
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| DomainError::order_view_not_found(order_id))
    }

    async fn project_order_event(
        &self,
        event_id: &str,
        consumer: &str,
        update: Option<&OrderViewUpdate>,
    ) -> Result<bool, DomainError> {
        if !self
            .consumed
            .lock()
            .unwrap()
            .insert((event_id.to_string(), consumer.to_string()))
        {
            return Ok(false);
        }
        if let Some(update) = update {
            let mut views = self.views.lock().unwrap();
            let entry = views
                .entry(update.order_id.clone())
                .or_insert_with(|| OrderView {
                    order_id: update.order_id.clone(),
                    status: String::new(),
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
        if !self
            .consumed
            .lock()
            .unwrap()
            .insert((event_id.to_string(), consumer.to_string()))
        {
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

    async fn rebuild_from_orders(&self, _limit: i64) -> Result<u64, DomainError> {
        Ok(0)
    }
}

#[derive(Default)]
struct NullCache;

#[async_trait::async_trait]
impl ViewCache for NullCache {
    async fn get_order_view(&self, _order_id: &str) -> Result<Option<OrderView>, DomainError> {
        Ok(None)
    }

    async fn set_order_view(&self, _view: &OrderView) -> Result<(), DomainError> {
        Ok(())
    }

    async fn invalidate_order_view(&self, _order_id: &str) -> Result<(), DomainError> {
        Ok(())
    }
}

/// What the outbox publisher would put on the wire for a given row.
fn envelope_bytes(insert: &OutboxInsert) -> Vec<u8> {
    EventEnvelope::with_event_id(
        insert.event_id.clone(),
        insert.aggregate_id.clone(),
        insert.event_type.clone(),
        Utc::now(),
        insert.payload.clone(),
    )
    .to_bytes()
    .expect("envelope serializes")
}

struct Pipeline {
    order_service: OrderService,
    order_store: Arc<MemoryOrderStore>,
    inventory: Arc<MemoryInventory>,
    worker: TicketWorker,
    ticket_store: Arc<SharedTicketStore>,
    query: QueryService,
    views: Arc<MemoryViewStore>,
}

fn pipeline() -> Pipeline {
    let order_store = Arc::new(MemoryOrderStore::default());
    let inventory = Arc::new(MemoryInventory::default());
    let order_service = OrderService::new(
        order_store.clone(),
        inventory.clone(),
        OrderServiceConfig {
            payment_sign_key: Some(secrecy::SecretString::new(SIGN_KEY.to_string())),
            ..OrderServiceConfig::default()
        },
    );

    let ticket_store = Arc::new(SharedTicketStore::new(order_store.clone()));
    let worker = TicketWorker::new(
        Arc::new(IdleConsumer),
        Arc::new(FixedSeatAllocator),
        ticket_store.clone(),
    );

    let views = Arc::new(MemoryViewStore::default());
    let query = QueryService::new(views.clone(), Arc::new(NullCache));

    Pipeline {
        order_service,
        order_store,
        inventory,
        worker,
        ticket_store,
        query,
        views,
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn reserve_pay_ticket_projects_to_ticketed_view() {
    let p = pipeline();

    // Create and reserve.
    let order = p.order_service.create_order("idem-1", 9900).await.unwrap();
    let reserved = p
        .order_service
        .reserve_order(ReserveOrderRequest {
            order_id: order.order_id.clone(),
            partition_key: "A".to_string(),
            hold_id: "h1".to_string(),
            qty: 1,
            capacity: 2,
        })
        .await
        .unwrap();
    assert_eq!(reserved.status, OrderStatus::Reserved);

    // Pay with a valid signature.
    let paid = p
        .order_service
        .payment_callback(PaymentCallbackRequest {
            order_id: order.order_id.clone(),
            provider_txn_id: "txn-1".to_string(),
            status: "SUCCESS".to_string(),
            partition_key: "A".to_string(),
            hold_id: "h1".to_string(),
            signature: sign_payload(SIGN_KEY, &order.order_id, "txn-1", "SUCCESS"),
        })
        .await
        .unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);

    // Project the order events; feed OrderPaid to the ticket worker too.
    let order_events = p.order_store.drain_outbox();
    let types: Vec<_> = order_events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["OrderCreated", "OrderReserved", "OrderPaid"]);

    for event in &order_events {
        let raw = envelope_bytes(event);
        p.query.handle_order_event(&raw).await.unwrap();
        p.worker.handle_message(&raw).await.unwrap();
    }

    // The worker issued exactly one ticket and queued TicketIssued.
    let ticket_events = p.ticket_store.drain_outbox();
    assert_eq!(ticket_events.len(), 1);
    let seat: &JsonValue = &ticket_events[0].payload["seat_no"];
    let seat = seat.as_str().unwrap().to_string();
    assert!(seat.starts_with("SEAT-"));

    // Project the ticket event.
    p.query
        .handle_ticket_event(&envelope_bytes(&ticket_events[0]))
        .await
        .unwrap();

    let view = p.query.get_order_view(&order.order_id).await.unwrap();
    assert_eq!(view.status, "TICKETED");
    assert_eq!(view.seat_no, seat);
    assert_eq!(view.amount_cents, 9900);
    assert_eq!(view.provider_txn_id, "txn-1");

    // The confirmed hold is gone from the engine.
    assert!(p.inventory.holds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn double_reserve_places_exactly_one_hold() {
    let p = pipeline();
    let order = p.order_service.create_order("idem-1", 9900).await.unwrap();

    let request = ReserveOrderRequest {
        order_id: order.order_id.clone(),
        partition_key: "A".to_string(),
        hold_id: "h1".to_string(),
        qty: 1,
        capacity: 2,
    };
    p.order_service.reserve_order(request.clone()).await.unwrap();
    let second = p.order_service.reserve_order(request).await.unwrap();

    assert_eq!(second.status, OrderStatus::Reserved);
    assert_eq!(p.inventory.try_holds.load(Ordering::SeqCst), 1);
    // The hold is still in place; no compensation ran.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(p.inventory.holds.lock().unwrap().contains("h1"));
}

#[tokio::test]
async fn redelivered_order_paid_issues_one_ticket() {
    let p = pipeline();
    let order = p.order_service.create_order("idem-1", 9900).await.unwrap();
    p.order_service
        .reserve_order(ReserveOrderRequest {
            order_id: order.order_id.clone(),
            partition_key: "A".to_string(),
            hold_id: "h1".to_string(),
            qty: 1,
            capacity: 2,
        })
        .await
        .unwrap();
    p.order_service
        .payment_callback(PaymentCallbackRequest {
            order_id: order.order_id.clone(),
            provider_txn_id: "txn-1".to_string(),
            status: "success".to_string(),
            partition_key: "A".to_string(),
            hold_id: "h1".to_string(),
            signature: sign_payload(SIGN_KEY, &order.order_id, "txn-1", "success"),
        })
        .await
        .unwrap();

    let paid_event = p
        .order_store
        .drain_outbox()
        .into_iter()
        .find(|e| e.event_type == "OrderPaid")
        .expect("OrderPaid queued");
    let raw = envelope_bytes(&paid_event);

    p.worker.handle_message(&raw).await.unwrap();
    p.worker.handle_message(&raw).await.unwrap();

    assert_eq!(p.ticket_store.tickets.lock().unwrap().len(), 1);
    assert_eq!(p.ticket_store.drain_outbox().len(), 1);
}

#[tokio::test]
async fn duplicate_projection_is_ignored_by_the_ledger() {
    let p = pipeline();
    let order = p.order_service.create_order("idem-1", 500).await.unwrap();
    let created = p.order_store.drain_outbox().remove(0);
    let raw = envelope_bytes(&created);

    p.query.handle_order_event(&raw).await.unwrap();
    p.query.handle_order_event(&raw).await.unwrap();

    let view = p.views.views.lock().unwrap().get(&order.order_id).cloned();
    assert_eq!(view.unwrap().status, "INIT");
    assert_eq!(p.views.consumed.lock().unwrap().len(), 1);
}
