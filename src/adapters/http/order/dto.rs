//! HTTP DTOs for order endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::Order;

/// Body of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderBody {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub amount_cents: i64,
}

/// Body of `POST /orders/reserve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveOrderBody {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub hold_id: String,
    #[serde(default)]
    pub qty: i64,
    #[serde(default)]
    pub capacity: i64,
}

/// Body of `POST /payments/callback`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentCallbackBody {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub provider_txn_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub hold_id: String,
    #[serde(default)]
    pub signature: String,
}

/// Body of `POST /orders/cancel`.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderBody {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub hold_id: String,
}

/// Query of `GET /orders/get`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetOrderParams {
    pub order_id: String,
}

/// Order as returned by every order endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub idempotency_key: String,
    pub status: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            idempotency_key: order.idempotency_key,
            status: order.status.as_str().to_string(),
            amount_cents: order.amount_cents,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
