//! HTTP handlers for inventory endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::adapters::http::error::{domain_error_response, invalid_json_response};
use crate::application::inventory::{InventoryService, TryHoldCommand};

use super::dto::{AvailabilityParams, AvailabilityResponse, HoldRefBody, TryHoldBody};

/// POST /inventory/try-hold
pub async fn try_hold(
    State(service): State<Arc<InventoryService>>,
    body: Result<Json<TryHoldBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    let cmd = TryHoldCommand {
        partition_key: body.partition_key,
        hold_id: body.hold_id,
        qty: body.qty,
        capacity: body.capacity,
    };
    match service.try_hold(cmd).await {
        Ok(state) => Json(state).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// POST /inventory/release-hold
pub async fn release_hold(
    State(service): State<Arc<InventoryService>>,
    body: Result<Json<HoldRefBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    match service.release_hold(&body.partition_key, &body.hold_id).await {
        Ok(state) => Json(state).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// POST /inventory/confirm-hold
pub async fn confirm_hold(
    State(service): State<Arc<InventoryService>>,
    body: Result<Json<HoldRefBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    match service.confirm_hold(&body.partition_key, &body.hold_id).await {
        Ok(state) => Json(state).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// GET /inventory/availability?partition_key=...
pub async fn availability(
    State(service): State<Arc<InventoryService>>,
    Query(params): Query<AvailabilityParams>,
) -> Response {
    match service.get_availability(&params.partition_key).await {
        Ok(Some(available)) => Json(AvailabilityResponse {
            partition_key: params.partition_key,
            available,
        })
        .into_response(),
        Ok(None) => domain_error_response(
            &crate::domain::foundation::DomainError::new(
                crate::domain::foundation::ErrorCode::HoldNotFound,
                "partition not found",
            )
            .with_detail("partition_key", params.partition_key),
        ),
        Err(err) => domain_error_response(&err),
    }
}
