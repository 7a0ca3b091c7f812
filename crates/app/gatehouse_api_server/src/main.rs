//! Gatehouse API server binary.
//!
//! Connects the credential store (PostgreSQL) and the session cache (Redis),
//! runs migrations and serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use clap::Parser;
use gatehouse_api::AppState;
use gatehouse_api::config::ApiConfig;
use gatehouse_core::auth::jwt::ServiceTokenCodec;
use gatehouse_core::auth::memory::MemoryCredentialStore;
use gatehouse_core::auth::store::{CredentialStore, PgCredentialStore};
use gatehouse_core::session::{CacheError, MemorySessionCache, RedisSessionCache, SessionCache};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

/// Upper bound on a minted service token's lifetime: ten years.
const MAX_SERVICE_TOKEN_HOURS: i64 = 24 * 366 * 10;

const DEFAULT_LOG_FILTER: &str = "info,gatehouse_api=debug,gatehouse_core=debug";

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "gatehouse_api_server", about = "Gatehouse API server")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/gatehouse"
    )]
    database_url: String,

    /// Redis connection URL for the session cache.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Deadline for a single session cache command, in milliseconds.
    #[arg(long, env = "CACHE_TIMEOUT_MS", default_value_t = 2000)]
    cache_timeout_ms: u64,

    /// Attempts at the initial Redis connection before giving up.
    #[arg(long, default_value_t = 3)]
    redis_connect_attempts: u32,

    /// Delay between Redis connection attempts, in seconds.
    #[arg(long, default_value_t = 15)]
    redis_retry_delay_secs: u64,

    /// Keep users, roles and sessions in memory. Nothing survives a restart.
    #[arg(long, default_value_t = false)]
    ephemeral: bool,

    /// Print a service-to-service token for APP_NAME and exit.
    #[arg(long, value_name = "APP_NAME")]
    mint_service_token: Option<String>,

    /// Lifetime of a minted service token, in hours.
    #[arg(
        long,
        default_value_t = 24 * 30,
        value_parser = clap::value_parser!(i64).range(1..=MAX_SERVICE_TOKEN_HOURS)
    )]
    service_token_hours: i64,
}

impl Args {
    /// Environment defaults, overridden by whatever was given on the command line.
    fn api_config(&self) -> ApiConfig {
        ApiConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            pg_connection_url: self.database_url.clone(),
            redis_url: self.redis_url.clone(),
            cache_timeout: Duration::from_millis(self.cache_timeout_ms),
            ..ApiConfig::from_env()
        }
    }
}

/// Connect to Redis, retrying a fixed number of times before giving up.
async fn connect_redis(
    url: &str,
    op_timeout: Duration,
    attempts: u32,
    delay: Duration,
) -> Result<RedisSessionCache, CacheError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match RedisSessionCache::connect(url, op_timeout).await {
            Ok(cache) => {
                info!(attempt, "connected to Redis");
                return Ok(cache);
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, "could not connect to Redis: {e}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!(attempts, "failed to connect to Redis after all retries");
                return Err(e);
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let config = args.api_config();

    if let Some(app_name) = &args.mint_service_token {
        let codec = ServiceTokenCodec::new(config.app_jwt_secret.as_bytes());
        let lifetime = TimeDelta::try_hours(args.service_token_hours)
            .ok_or("service token lifetime out of range")?;
        let expires_at = Utc::now() + lifetime;
        println!("{}", codec.mint(app_name, expires_at)?);
        info!(app = %app_name, %expires_at, "minted service token");
        return Ok(());
    }

    let (store, cache): (Arc<dyn CredentialStore>, Arc<dyn SessionCache>) = if args.ephemeral {
        warn!("ephemeral mode: users and sessions are kept in memory");
        (
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionCache::new()),
        )
    } else {
        info!(
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        gatehouse_api::migrate(&pool).await?;

        let redis = connect_redis(
            &config.redis_url,
            config.cache_timeout,
            args.redis_connect_attempts,
            Duration::from_secs(args.redis_retry_delay_secs),
        )
        .await?;

        (Arc::new(PgCredentialStore::new(pool)), Arc::new(redis))
    };

    let state = AppState::new(config.clone(), store, cache);
    let app = gatehouse_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::try_parse_from(["gatehouse_api_server"]).unwrap();
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.max_connections, 5);
        assert_eq!(args.redis_connect_attempts, 3);
        assert_eq!(args.redis_retry_delay_secs, 15);
        assert!(!args.ephemeral);
        assert!(args.mint_service_token.is_none());
    }

    #[test]
    fn mint_flag_takes_app_name() {
        let args = Args::try_parse_from([
            "gatehouse_api_server",
            "--mint-service-token",
            "billing",
            "--service-token-hours",
            "1",
        ])
        .unwrap();
        assert_eq!(args.mint_service_token.as_deref(), Some("billing"));
        assert_eq!(args.service_token_hours, 1);
    }

    #[test]
    fn service_token_hours_must_be_positive_and_bounded() {
        for bad in ["0", "-5", "1000000000000"] {
            let flag = format!("--service-token-hours={bad}");
            let parsed = Args::try_parse_from([
                "gatehouse_api_server",
                "--mint-service-token",
                "billing",
                flag.as_str(),
            ]);
            assert!(parsed.is_err(), "accepted {bad}");
        }
        let max = format!("--service-token-hours={MAX_SERVICE_TOKEN_HOURS}");
        let args = Args::try_parse_from(["gatehouse_api_server", max.as_str()]).unwrap();
        assert!(TimeDelta::try_hours(args.service_token_hours).is_some());
    }

    #[tokio::test]
    async fn redis_connect_gives_up_after_attempts() {
        let result = connect_redis("not a url", Duration::from_millis(50), 2, Duration::ZERO).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
