//! HTTP routes for inventory endpoints.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::application::inventory::InventoryService;

use super::handlers::{availability, confirm_hold, release_hold, try_hold};

/// Creates the inventory router, mounted under `/inventory`.
pub fn inventory_routes(service: Arc<InventoryService>) -> Router {
    Router::new()
        .route("/try-hold", post(try_hold))
        .route("/release-hold", post(release_hold))
        .route("/confirm-hold", post(confirm_hold))
        .route("/availability", get(availability))
        .with_state(service)
}
