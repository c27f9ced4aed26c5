//! Order lifecycle service.
//!
//! Every transition follows the same envelope: read the current order,
//! short-circuit idempotent repeats, talk to the inventory engine, then run
//! one DB transaction (conditional status update + outbox row) behind the
//! `OrderStore` port and return the post-commit state via a fresh read.
//!
//! Reserve is the one operation with an external side effect *before* the
//! transaction (the hold). A [`ReleaseGuard`] arms right after a successful
//! `try_hold`; any early exit releases the hold in a fresh 2s context, so a
//! failed reserve never leaks inventory.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine};
use crate::domain::order::{Order, OrderStatus, Payment, PaymentSignatureVerifier};
use crate::ports::{
    InsertOutcome, InventoryApi, OrderStore, OutboxInsert, PaymentOutcome, TryHoldRequest,
};

/// Deadline for the compensating release after a failed reserve.
const COMPENSATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Defaults used when a request leaves hold fields empty.
#[derive(Debug, Clone)]
pub struct OrderServiceConfig {
    pub default_partition_key: String,
    pub default_hold_qty: i64,
    pub default_capacity: i64,
    pub payment_sign_key: Option<SecretString>,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            default_partition_key: "G123|2026-02-11|2nd".to_string(),
            default_hold_qty: 1,
            default_capacity: 500,
            payment_sign_key: None,
        }
    }
}

/// Input for `reserve_order`. Empty/non-positive fields resolve to defaults.
#[derive(Debug, Clone, Default)]
pub struct ReserveOrderRequest {
    pub order_id: String,
    pub partition_key: String,
    pub hold_id: String,
    pub qty: i64,
    pub capacity: i64,
}

/// Input for `payment_callback`.
#[derive(Debug, Clone, Default)]
pub struct PaymentCallbackRequest {
    pub order_id: String,
    pub provider_txn_id: String,
    pub status: String,
    pub partition_key: String,
    pub hold_id: String,
    pub signature: String,
}

/// Input for `cancel_order`.
#[derive(Debug, Clone, Default)]
pub struct CancelOrderRequest {
    pub order_id: String,
    pub partition_key: String,
    pub hold_id: String,
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    inventory: Arc<dyn InventoryApi>,
    verifier: PaymentSignatureVerifier,
    default_partition_key: String,
    default_hold_qty: i64,
    default_capacity: i64,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        inventory: Arc<dyn InventoryApi>,
        cfg: OrderServiceConfig,
    ) -> Self {
        let default_partition_key = if cfg.default_partition_key.is_empty() {
            OrderServiceConfig::default().default_partition_key
        } else {
            cfg.default_partition_key
        };
        Self {
            store,
            inventory,
            verifier: PaymentSignatureVerifier::new(cfg.payment_sign_key),
            default_partition_key,
            default_hold_qty: cfg.default_hold_qty.max(1),
            default_capacity: if cfg.default_capacity <= 0 {
                500
            } else {
                cfg.default_capacity
            },
        }
    }

    /// Creates an order in `INIT`, or returns the existing order for a
    /// repeated idempotency key.
    pub async fn create_order(
        &self,
        idempotency_key: &str,
        amount_cents: i64,
    ) -> Result<Order, DomainError> {
        if let Some(existing) = self.store.find_by_idempotency_key(idempotency_key).await? {
            return Ok(existing);
        }

        let order = Order::new(Uuid::new_v4().to_string(), idempotency_key, amount_cents)?;
        let event = OutboxInsert::new(
            order.order_id.clone(),
            "OrderCreated",
            json!({
                "order_id": order.order_id,
                "idempotency_key": order.idempotency_key,
                "status": order.status.as_str(),
                "amount_cents": order.amount_cents,
            }),
        );

        match self.store.insert_with_outbox(&order, &event).await? {
            InsertOutcome::Inserted => self.store.find_by_id(&order.order_id).await,
            InsertOutcome::DuplicateKey => self
                .store
                .find_by_idempotency_key(idempotency_key)
                .await?
                .ok_or_else(|| {
                    DomainError::internal("duplicate idempotency key without stored order")
                }),
        }
    }

    /// Moves `INIT -> RESERVED`, placing the inventory hold first.
    pub async fn reserve_order(&self, req: ReserveOrderRequest) -> Result<Order, DomainError> {
        let current = self.store.find_by_id(&req.order_id).await?;
        if current.status == OrderStatus::Reserved {
            return Ok(current);
        }
        if !current.status.can_transition_to(&OrderStatus::Reserved) {
            return Err(DomainError::invalid_state_transfer());
        }

        let hold = self.resolve_hold_config(
            &req.order_id,
            &req.partition_key,
            &req.hold_id,
            req.qty,
            req.capacity,
        );
        self.inventory
            .try_hold(&TryHoldRequest {
                partition_key: hold.partition_key.clone(),
                hold_id: hold.hold_id.clone(),
                qty: hold.qty,
                capacity: hold.capacity,
            })
            .await?;

        let mut guard = ReleaseGuard::armed(
            Arc::clone(&self.inventory),
            req.order_id.clone(),
            hold.partition_key.clone(),
            hold.hold_id.clone(),
        );

        let event = OutboxInsert::new(
            req.order_id.clone(),
            "OrderReserved",
            json!({
                "order_id": req.order_id,
                "status": OrderStatus::Reserved.as_str(),
                "partition_key": hold.partition_key,
                "hold_id": hold.hold_id,
                "hold_qty": hold.qty,
            }),
        );
        let updated = self
            .store
            .transition_with_outbox(
                &req.order_id,
                OrderStatus::Init,
                OrderStatus::Reserved,
                &event,
            )
            .await?;

        if !updated {
            let current = self.store.find_by_id(&req.order_id).await?;
            if current.status == OrderStatus::Reserved {
                // A concurrent reserve won the race; the hold is theirs now.
                guard.disarm();
                return Ok(current);
            }
            return Err(DomainError::invalid_state_transfer());
        }

        guard.disarm();
        self.store.find_by_id(&req.order_id).await
    }

    /// Handles the payment provider callback, moving `RESERVED -> PAID`.
    pub async fn payment_callback(
        &self,
        req: PaymentCallbackRequest,
    ) -> Result<Order, DomainError> {
        self.verifier.verify(
            &req.order_id,
            &req.provider_txn_id,
            &req.status,
            &req.signature,
        )?;
        if !req.status.trim().eq_ignore_ascii_case("SUCCESS") {
            return Err(DomainError::invalid_payment_status(&req.status));
        }

        let hold = self.resolve_hold_config(&req.order_id, &req.partition_key, &req.hold_id, 0, 0);
        let current = self.store.find_by_id(&req.order_id).await?;
        if matches!(current.status, OrderStatus::Paid | OrderStatus::Ticketed) {
            return Ok(current);
        }
        if !current.status.can_transition_to(&OrderStatus::Paid) {
            return Err(DomainError::invalid_state_transfer());
        }

        match self
            .inventory
            .confirm_hold(&hold.partition_key, &hold.hold_id)
            .await
        {
            Ok(()) => {}
            Err(err) if err.code == ErrorCode::HoldNotFound => {}
            Err(err) => return Err(err),
        }

        let payment = Payment {
            payment_id: Uuid::new_v4().to_string(),
            order_id: req.order_id.clone(),
            provider_txn_id: req.provider_txn_id.clone(),
            status: req.status.clone(),
        };
        let event = OutboxInsert::new(
            req.order_id.clone(),
            "OrderPaid",
            json!({
                "order_id": req.order_id,
                "provider_txn_id": req.provider_txn_id,
                "partition_key": hold.partition_key,
                "hold_id": hold.hold_id,
                "status": OrderStatus::Paid.as_str(),
            }),
        );

        match self.store.record_payment(&payment, &event).await? {
            PaymentOutcome::Applied | PaymentOutcome::DuplicateTxn => {
                self.store.find_by_id(&req.order_id).await
            }
            PaymentOutcome::StatusConflict => {
                let current = self.store.find_by_id(&req.order_id).await?;
                if current.status == OrderStatus::Paid {
                    Ok(current)
                } else {
                    Err(DomainError::invalid_state_transfer())
                }
            }
        }
    }

    /// Cancels from `INIT` or `RESERVED`, releasing the hold first when one
    /// was placed.
    pub async fn cancel_order(&self, req: CancelOrderRequest) -> Result<Order, DomainError> {
        let current = self.store.find_by_id(&req.order_id).await?;
        if current.status == OrderStatus::Cancelled {
            return Ok(current);
        }
        if !current.status.can_transition_to(&OrderStatus::Cancelled) {
            return Err(DomainError::invalid_state_transfer());
        }

        let hold = self.resolve_hold_config(&req.order_id, &req.partition_key, &req.hold_id, 0, 0);
        if current.status == OrderStatus::Reserved {
            match self
                .inventory
                .release_hold(&hold.partition_key, &hold.hold_id)
                .await
            {
                Ok(()) => {}
                Err(err) if err.code == ErrorCode::HoldNotFound => {}
                Err(err) => return Err(err),
            }
        }

        let event = OutboxInsert::new(
            req.order_id.clone(),
            "OrderCancelled",
            json!({
                "order_id": req.order_id,
                "partition_key": hold.partition_key,
                "hold_id": hold.hold_id,
                "status": OrderStatus::Cancelled.as_str(),
            }),
        );
        let updated = self
            .store
            .transition_with_outbox(
                &req.order_id,
                current.status,
                OrderStatus::Cancelled,
                &event,
            )
            .await?;

        if !updated {
            let latest = self.store.find_by_id(&req.order_id).await?;
            if latest.status == OrderStatus::Cancelled {
                return Ok(latest);
            }
            return Err(DomainError::invalid_state_transfer());
        }
        self.store.find_by_id(&req.order_id).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, DomainError> {
        self.store.find_by_id(order_id).await
    }

    fn resolve_hold_config(
        &self,
        order_id: &str,
        partition_key: &str,
        hold_id: &str,
        qty: i64,
        capacity: i64,
    ) -> ResolvedHold {
        let partition_key = partition_key.trim();
        let hold_id = hold_id.trim();
        ResolvedHold {
            partition_key: if partition_key.is_empty() {
                self.default_partition_key.clone()
            } else {
                partition_key.to_string()
            },
            hold_id: if hold_id.is_empty() {
                order_id.to_string()
            } else {
                hold_id.to_string()
            },
            qty: if qty <= 0 { self.default_hold_qty } else { qty },
            capacity: if capacity <= 0 {
                self.default_capacity
            } else {
                capacity
            },
        }
    }
}

struct ResolvedHold {
    partition_key: String,
    hold_id: String,
    qty: i64,
    capacity: i64,
}

/// Compensation guard for a placed hold.
///
/// While armed, dropping the guard spawns a release of the hold on a fresh
/// task with its own 2s deadline, detached from the (possibly cancelled)
/// request context. Release errors other than `hold_not_found` are logged
/// and never mask the failure that triggered the compensation.
struct ReleaseGuard {
    inventory: Arc<dyn InventoryApi>,
    order_id: String,
    partition_key: String,
    hold_id: String,
    armed: bool,
}

impl ReleaseGuard {
    fn armed(
        inventory: Arc<dyn InventoryApi>,
        order_id: String,
        partition_key: String,
        hold_id: String,
    ) -> Self {
        Self {
            inventory,
            order_id,
            partition_key,
            hold_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let inventory = Arc::clone(&self.inventory);
        let order_id = std::mem::take(&mut self.order_id);
        let partition_key = std::mem::take(&mut self.partition_key);
        let hold_id = std::mem::take(&mut self.hold_id);
        tokio::spawn(async move {
            let release = tokio::time::timeout(
                COMPENSATION_TIMEOUT,
                inventory.release_hold(&partition_key, &hold_id),
            )
            .await;
            match release {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.code == ErrorCode::HoldNotFound => {}
                Ok(Err(err)) => {
                    tracing::error!(
                        error = %err,
                        order_id = %order_id,
                        hold_id = %hold_id,
                        "reserve compensation release failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        order_id = %order_id,
                        hold_id = %hold_id,
                        "reserve compensation release timed out"
                    );
                }
            }
        });
    }
}
