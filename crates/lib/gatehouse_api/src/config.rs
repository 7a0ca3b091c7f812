//! API server configuration.

use std::time::Duration;

use gatehouse_core::auth::jwt::{SERVICE_SECRET_ENV, USER_SECRET_ENV, resolve_secret};
use gatehouse_core::session::redis::DEFAULT_OP_TIMEOUT;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Redis connection URL for the session cache.
    pub redis_url: String,
    /// Signing secret for end-user tokens.
    pub jwt_secret: String,
    /// Signing secret for service-to-service tokens.
    pub app_jwt_secret: String,
    /// Deadline for a single session cache command.
    pub cache_timeout: Duration,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable           | Default                                  |
    /// |--------------------|------------------------------------------|
    /// | `BIND_ADDR`        | `0.0.0.0:8080`                           |
    /// | `DATABASE_URL`     | `postgres://localhost:5432/gatehouse`    |
    /// | `REDIS_URL`        | `redis://127.0.0.1:6379`                 |
    /// | `JWT_SECRET`       | generated & persisted to file            |
    /// | `JWT_APP_SECRET`   | generated & persisted to a separate file |
    /// | `CACHE_TIMEOUT_MS` | `2000`                                   |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/gatehouse".into()),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: resolve_secret(USER_SECRET_ENV, "jwt-secret"),
            app_jwt_secret: resolve_secret(SERVICE_SECRET_ENV, "jwt-app-secret"),
            cache_timeout: std::env::var("CACHE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_OP_TIMEOUT),
        }
    }
}
