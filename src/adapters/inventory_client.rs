//! HTTP client adapter for the InventoryApi port.
//!
//! Thin JSON-over-HTTP wrapper around the inventory engine's endpoints.
//! A 404 whose body says "hold not found" maps to `HoldNotFound` so callers
//! can treat re-release and re-confirm as idempotent; every other non-2xx
//! surfaces as `DependencyUnavailable` with the engine's error message.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::foundation::DomainError;
use crate::ports::{InventoryApi, TryHoldRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HttpInventoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpInventoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DomainError::dependency(format!("build http client failed: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), DomainError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::dependency(format!("inventory {} failed: {}", path, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: JsonValue = response.json().await.unwrap_or(JsonValue::Null);
        let message = body
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND
            && message.to_lowercase().contains("hold not found")
        {
            return Err(DomainError::hold_not_found());
        }
        Err(DomainError::dependency(format!(
            "inventory {} failed: status={} err={}",
            path,
            status.as_u16(),
            message.trim()
        )))
    }
}

#[derive(Serialize)]
struct HoldRefBody<'a> {
    partition_key: &'a str,
    hold_id: &'a str,
}

#[async_trait]
impl InventoryApi for HttpInventoryClient {
    async fn try_hold(&self, request: &TryHoldRequest) -> Result<(), DomainError> {
        self.post("/inventory/try-hold", request).await
    }

    async fn release_hold(&self, partition_key: &str, hold_id: &str) -> Result<(), DomainError> {
        self.post(
            "/inventory/release-hold",
            &HoldRefBody {
                partition_key,
                hold_id,
            },
        )
        .await
    }

    async fn confirm_hold(&self, partition_key: &str, hold_id: &str) -> Result<(), DomainError> {
        self.post(
            "/inventory/confirm-hold",
            &HoldRefBody {
                partition_key,
                hold_id,
            },
        )
        .await
    }
}
