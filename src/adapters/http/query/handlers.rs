//! HTTP handlers for query endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::adapters::http::error::domain_error_response;
use crate::application::query::QueryService;

use super::dto::GetOrderViewParams;

/// GET /query/orders?order_id=...
pub async fn get_order_view(
    State(service): State<Arc<QueryService>>,
    Query(params): Query<GetOrderViewParams>,
) -> Response {
    match service.get_order_view(&params.order_id).await {
        Ok(view) => Json(view).into_response(),
        Err(err) => domain_error_response(&err),
    }
}
