//! Read-model row for `query_order_view`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Denormalized projection of an order, maintained by the event projector.
///
/// `amount_cents` and `provider_txn_id` survive partial updates: a
/// projection carrying a zero amount or empty txn id leaves the stored
/// value in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: String,
    pub status: String,
    pub amount_cents: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_txn_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seat_no: String,
    pub updated_at: DateTime<Utc>,
}
