//! PostgreSQL configuration.

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::error::ValidationError;

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,

    /// Maximum open connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Idle connections kept warm.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Maximum connection lifetime in minutes.
    #[serde(default = "default_max_lifetime_mins")]
    pub max_lifetime_mins: u64,

    /// Idle timeout in minutes.
    #[serde(default = "default_idle_timeout_mins")]
    pub idle_timeout_mins: u64,
}

impl DatabaseConfig {
    /// Builds a lazily-connecting pool with the configured limits.
    pub fn pool(&self) -> Result<PgPool, ValidationError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .max_lifetime(Duration::from_secs(self.max_lifetime_mins * 60))
            .idle_timeout(Duration::from_secs(self.idle_timeout_mins * 60))
            .connect_lazy(&self.url)
            .map_err(|e| ValidationError::InvalidValue {
                field: "database.url",
                reason: format!("{}", e),
            })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.max_connections == 0 {
            return Err(ValidationError::InvalidValue {
                field: "database.max_connections",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_mins: default_max_lifetime_mins(),
            idle_timeout_mins: default_idle_timeout_mins(),
        }
    }
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    10
}

fn default_max_lifetime_mins() -> u64 {
    30
}

fn default_idle_timeout_mins() -> u64 {
    5
}
