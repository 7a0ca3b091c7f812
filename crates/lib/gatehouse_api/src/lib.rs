//! # gatehouse_api
//!
//! HTTP API library for Gatehouse.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use gatehouse_core::auth::jwt::{ServiceTokenCodec, UserTokenCodec};
use gatehouse_core::auth::store::CredentialStore;
use gatehouse_core::session::{SessionCache, SessionManager};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{app, health, roles, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Durable users and role grants.
    pub store: Arc<dyn CredentialStore>,
    /// Issues, validates and revokes end-user session tokens.
    pub sessions: SessionManager,
    /// Verifies service-to-service tokens.
    pub service_codec: ServiceTokenCodec,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the stores to two independent codecs built from the configured secrets.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        let user_codec = UserTokenCodec::new(config.jwt_secret.as_bytes());
        let service_codec = ServiceTokenCodec::new(config.app_jwt_secret.as_bytes());
        Self {
            store,
            sessions: SessionManager::new(cache, user_codec),
            service_codec,
            config,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `gatehouse_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    gatehouse_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/", get(health::index))
        .route("/register", post(users::register_handler))
        .route("/login", post(users::login_handler));

    // End-user routes (require a live session token)
    let user = Router::new()
        .route("/verify", get(users::verify_handler))
        .route("/", delete(users::delete_user_handler))
        .route("/session", delete(users::delete_session_handler))
        .route(
            "/roles",
            get(roles::list_roles_handler).post(roles::add_role_handler),
        )
        .route("/roles/{role}", get(roles::has_role_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    // Service-to-service routes (require a service token)
    let service = Router::new()
        .route("/app/verify", get(app::app_verify_handler))
        .route("/app/user/{username}", delete(app::app_delete_user_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_service,
        ));

    Router::new()
        .merge(public)
        .merge(user)
        .merge(service)
        .layer(cors)
        .with_state(state)
}
