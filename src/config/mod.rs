//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `FREELANCE_CHAT` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use freelance_chat::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod database;
mod error;
mod realtime;
mod redis;
mod server;

pub use auth::{AuthConfig, MIN_PRODUCTION_SECRET_BYTES};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use realtime::{BusKind, RealtimeConfig};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging, CORS)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Redis configuration, only needed for the Redis bus
    #[serde(default)]
    pub redis: RedisConfig,

    /// Token verification
    pub auth: AuthConfig,

    /// Room fan-out
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FREELANCE_CHAT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `FREELANCE_CHAT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `FREELANCE_CHAT__AUTH__JWT_SECRET=...` -> `auth.jwt_secret = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FREELANCE_CHAT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Redis settings are only checked when the Redis bus is selected.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.realtime.validate()?;
        if self.realtime.uses_redis() {
            self.redis.validate()?;
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
