//! HTTP routes for order endpoints.
//!
//! Mounted at the application root: the payment callback lives under
//! `/payments`, not `/orders`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::application::order::OrderService;

use super::handlers::{cancel_order, create_order, get_order, payment_callback, reserve_order};

pub fn order_routes(service: Arc<OrderService>) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/reserve", post(reserve_order))
        .route("/orders/cancel", post(cancel_order))
        .route("/orders/get", get(get_order))
        .route("/payments/callback", post(payment_callback))
        .with_state(service)
}
