//! Application configuration.
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values use the `TICKETD` prefix with `__`
//! as the nesting separator:
//!
//! - `TICKETD__SERVER__PORT=8080` -> `server.port = 8080`
//! - `TICKETD__DATABASE__URL=...` -> `database.url = ...`
//! - `TICKETD__ORDER__PAYMENT_SIGN_KEY=...` -> `order.payment_sign_key`

mod database;
mod error;
mod inventory;
mod order;
mod redis;
mod server;
mod streams;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use inventory::InventoryConfig;
pub use order::OrderConfig;
pub use redis::RedisConfig;
pub use server::ServerConfig;
pub use streams::StreamsConfig;

use serde::Deserialize;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub redis: RedisConfig,

    #[serde(default)]
    pub streams: StreamsConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub order: OrderConfig,
}

impl AppConfig {
    /// Loads configuration from the environment (and `.env` in
    /// development).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TICKETD")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.order.validate()?;
        Ok(())
    }
}
