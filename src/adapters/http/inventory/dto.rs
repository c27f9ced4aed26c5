//! HTTP DTOs for inventory endpoints.

use serde::{Deserialize, Serialize};

/// Body of `POST /inventory/try-hold`.
#[derive(Debug, Clone, Deserialize)]
pub struct TryHoldBody {
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub hold_id: String,
    #[serde(default)]
    pub qty: i64,
    #[serde(default)]
    pub capacity: i64,
}

/// Body of `POST /inventory/release-hold` and `/inventory/confirm-hold`.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldRefBody {
    #[serde(default)]
    pub partition_key: String,
    #[serde(default)]
    pub hold_id: String,
}

/// Query of `GET /inventory/availability`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityParams {
    pub partition_key: String,
}

/// Response of `GET /inventory/availability`.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub partition_key: String,
    pub available: i64,
}
