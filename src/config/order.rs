//! Order service configuration.

use secrecy::SecretString;
use serde::Deserialize;

use crate::application::order::OrderServiceConfig;

use super::error::ValidationError;

/// Order service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfig {
    /// Base URL of the inventory engine's HTTP API.
    #[serde(default = "default_inventory_base_url")]
    pub inventory_base_url: String,

    /// Partition used when a reserve request names none.
    #[serde(default = "default_partition_key")]
    pub default_partition_key: String,

    /// Hold quantity used when a reserve request sends none.
    #[serde(default = "default_hold_qty")]
    pub default_hold_qty: i64,

    /// Partition capacity used when a reserve request sends none.
    #[serde(default = "default_capacity")]
    pub default_capacity: i64,

    /// HMAC key for payment callback signatures. Empty disables
    /// verification.
    #[serde(default)]
    pub payment_sign_key: Option<SecretString>,
}

impl OrderConfig {
    pub fn service_config(&self) -> OrderServiceConfig {
        OrderServiceConfig {
            default_partition_key: self.default_partition_key.clone(),
            default_hold_qty: self.default_hold_qty,
            default_capacity: self.default_capacity,
            payment_sign_key: self.payment_sign_key.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.inventory_base_url.is_empty() {
            return Err(ValidationError::MissingRequired("INVENTORY_BASE_URL"));
        }
        Ok(())
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            inventory_base_url: default_inventory_base_url(),
            default_partition_key: default_partition_key(),
            default_hold_qty: default_hold_qty(),
            default_capacity: default_capacity(),
            payment_sign_key: None,
        }
    }
}

fn default_inventory_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_partition_key() -> String {
    "G123|2026-02-11|2nd".to_string()
}

fn default_hold_qty() -> i64 {
    1
}

fn default_capacity() -> i64 {
    500
}
