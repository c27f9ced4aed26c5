//! Order aggregate and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, StateMachine, ValidationError};

/// Lifecycle status of an order.
///
/// Allowed transitions:
/// `INIT -> RESERVED -> PAID -> TICKETED`, plus `INIT -> CANCELLED` and
/// `RESERVED -> CANCELLED`. Everything else is an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Init,
    Reserved,
    Paid,
    Ticketed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Init => "INIT",
            OrderStatus::Reserved => "RESERVED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Ticketed => "TICKETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "INIT" => Ok(OrderStatus::Init),
            "RESERVED" => Ok(OrderStatus::Reserved),
            "PAID" => Ok(OrderStatus::Paid),
            "TICKETED" => Ok(OrderStatus::Ticketed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::database(format!(
                "invalid order status value: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Init, Reserved)
                | (Reserved, Paid)
                | (Paid, Ticketed)
                | (Init, Cancelled)
                | (Reserved, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Init => vec![Reserved, Cancelled],
            Reserved => vec![Paid, Cancelled],
            Paid => vec![Ticketed],
            Ticketed => vec![],
            Cancelled => vec![],
        }
    }
}

/// The order aggregate. `idempotency_key` is unique across orders and makes
/// `create_order` safely retriable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub idempotency_key: String,
    pub status: OrderStatus,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in `INIT`.
    pub fn new(
        order_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        amount_cents: i64,
    ) -> Result<Self, DomainError> {
        let order_id = order_id.into();
        let idempotency_key = idempotency_key.into();
        if order_id.is_empty() {
            return Err(ValidationError::empty_field("order_id").into());
        }
        if idempotency_key.is_empty() {
            return Err(ValidationError::empty_field("idempotency_key").into());
        }
        if amount_cents <= 0 {
            return Err(DomainError::invalid_amount()
                .with_detail("amount_cents", amount_cents.to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            order_id,
            idempotency_key,
            status: OrderStatus::Init,
            amount_cents,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A payment recorded against an order. `provider_txn_id` is unique, which
/// turns duplicate provider callbacks into idempotent no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub order_id: String,
    pub provider_txn_id: String,
    pub status: String,
}
