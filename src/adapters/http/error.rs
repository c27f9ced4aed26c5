//! Domain error to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Error body shape shared by every endpoint: `{ "error": "<message>" }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Maps a domain error to its response. Status codes follow the public API
/// contract: invalid transitions conflict, lookups 404, bad signatures 401,
/// engine rejections (quantity, stock, backpressure) 400.
pub fn domain_error_response(err: &DomainError) -> Response {
    let status = status_for(err.code);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(ErrorResponse::new(err.message.clone()))).into_response()
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidStateTransfer => StatusCode::CONFLICT,
        ErrorCode::OrderNotFound | ErrorCode::HoldNotFound | ErrorCode::OrderViewNotFound => {
            StatusCode::NOT_FOUND
        }
        ErrorCode::InvalidSignature => StatusCode::UNAUTHORIZED,
        ErrorCode::InvalidQuantity
        | ErrorCode::InvalidAmount
        | ErrorCode::InvalidPaymentStatus
        | ErrorCode::InsufficientStock
        | ErrorCode::Backpressure
        | ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::DatabaseError
        | ErrorCode::CacheError
        | ErrorCode::SerializationFailed
        | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Response for unparseable request bodies.
pub fn invalid_json_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("invalid_json")),
    )
        .into_response()
}
