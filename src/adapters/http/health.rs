//! Liveness and readiness probes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// GET /healthz - process is up.
async fn healthz() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

/// GET /readyz - recovery finished and routes are serving.
async fn readyz() -> Response {
    (StatusCode::OK, Json(json!({"status": "ready"}))).into_response()
}

pub fn health_routes() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
