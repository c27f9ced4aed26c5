//! HTTP routes for query endpoints.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::application::query::QueryService;

use super::handlers::get_order_view;

/// Creates the query router, mounted under `/query`.
pub fn query_routes(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/orders", get(get_order_view))
        .with_state(service)
}
