//! HTTP DTOs for query endpoints.

use serde::Deserialize;

/// Query of `GET /query/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetOrderViewParams {
    pub order_id: String,
}
