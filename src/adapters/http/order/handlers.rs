//! HTTP handlers for order endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::adapters::http::error::{domain_error_response, invalid_json_response};
use crate::application::order::{
    CancelOrderRequest, OrderService, PaymentCallbackRequest, ReserveOrderRequest,
};

use super::dto::{
    CancelOrderBody, CreateOrderBody, GetOrderParams, OrderResponse, PaymentCallbackBody,
    ReserveOrderBody,
};

/// POST /orders
pub async fn create_order(
    State(service): State<Arc<OrderService>>,
    body: Result<Json<CreateOrderBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    match service
        .create_order(&body.idempotency_key, body.amount_cents)
        .await
    {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// POST /orders/reserve
pub async fn reserve_order(
    State(service): State<Arc<OrderService>>,
    body: Result<Json<ReserveOrderBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    let request = ReserveOrderRequest {
        order_id: body.order_id,
        partition_key: body.partition_key,
        hold_id: body.hold_id,
        qty: body.qty,
        capacity: body.capacity,
    };
    match service.reserve_order(request).await {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// POST /payments/callback
pub async fn payment_callback(
    State(service): State<Arc<OrderService>>,
    body: Result<Json<PaymentCallbackBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    let request = PaymentCallbackRequest {
        order_id: body.order_id,
        provider_txn_id: body.provider_txn_id,
        status: body.status,
        partition_key: body.partition_key,
        hold_id: body.hold_id,
        signature: body.signature,
    };
    match service.payment_callback(request).await {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// POST /orders/cancel
pub async fn cancel_order(
    State(service): State<Arc<OrderService>>,
    body: Result<Json<CancelOrderBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return invalid_json_response();
    };
    let request = CancelOrderRequest {
        order_id: body.order_id,
        partition_key: body.partition_key,
        hold_id: body.hold_id,
    };
    match service.cancel_order(request).await {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(err) => domain_error_response(&err),
    }
}

/// GET /orders/get?order_id=...
pub async fn get_order(
    State(service): State<Arc<OrderService>>,
    Query(params): Query<GetOrderParams>,
) -> Response {
    match service.get_order(&params.order_id).await {
        Ok(order) => Json(OrderResponse::from(order)).into_response(),
        Err(err) => domain_error_response(&err),
    }
}
