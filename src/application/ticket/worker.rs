//! Ticket worker - turns paid orders into issued tickets.
//!
//! Consumes `order.events`, reacting only to `OrderPaid`: allocate a seat,
//! then in one DB transaction (behind `TicketStore`) verify the order is
//! still `PAID`, insert the ticket, mark the order `TICKETED` and write the
//! `TicketIssued` outbox row. The unique ticket-per-order constraint makes
//! redelivered events harmless.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::domain::ticket::Ticket;
use crate::ports::{
    EventStreamConsumer, OutboxInsert, SeatAllocator, TicketOutcome, TicketStore,
};

/// Stream that carries ticket events.
pub const TICKET_EVENTS_STREAM: &str = "ticket.events";

/// Pause after a failed fetch before retrying.
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct TicketWorker {
    consumer: Arc<dyn EventStreamConsumer>,
    allocator: Arc<dyn SeatAllocator>,
    store: Arc<dyn TicketStore>,
}

impl TicketWorker {
    pub fn new(
        consumer: Arc<dyn EventStreamConsumer>,
        allocator: Arc<dyn SeatAllocator>,
        store: Arc<dyn TicketStore>,
    ) -> Self {
        Self {
            consumer,
            allocator,
            store,
        }
    }

    /// Consumes order events until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                fetched = self.consumer.fetch() => {
                    match fetched {
                        Ok(Some(message)) => {
                            if let Err(err) = self.handle_message(&message.payload).await {
                                tracing::error!(error = %err, "handle order event failed");
                            }
                            if let Err(err) = self.consumer.commit(&message).await {
                                tracing::error!(error = %err, "commit order event failed");
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::error!(error = %err, "read order event failed");
                            tokio::time::sleep(FETCH_RETRY_DELAY).await;
                        }
                    }
                }
            }
        }
    }

    /// Handles one raw order event. Non-`OrderPaid` events are skipped.
    pub async fn handle_message(&self, raw: &[u8]) -> Result<(), DomainError> {
        let envelope = EventEnvelope::from_slice(raw)?;
        if envelope.event_type != "OrderPaid" {
            return Ok(());
        }

        let order_id = envelope.aggregate_id;
        let seat_no = self.allocator.allocate_seat(&order_id).await?;

        let ticket = Ticket {
            ticket_id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            passenger_name: seat_no.clone(),
        };
        let event = OutboxInsert::new(
            order_id.clone(),
            "TicketIssued",
            json!({
                "order_id": order_id,
                "seat_no": seat_no,
            }),
        );

        match self.store.issue_ticket(&ticket, &event).await? {
            TicketOutcome::Issued => {
                tracing::info!(order_id = %order_id, seat_no = %seat_no, "ticket issued");
            }
            TicketOutcome::AlreadyIssued => {
                tracing::debug!(order_id = %order_id, "ticket already issued");
            }
            TicketOutcome::OrderNotPaid => {
                tracing::debug!(order_id = %order_id, "order not paid, skipping ticket");
            }
        }
        Ok(())
    }
}
