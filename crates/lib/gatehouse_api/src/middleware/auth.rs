//! Authentication middleware for the two token universes.
//!
//! End-user tokens arrive in `x-auth-token` and must be the subject's live
//! session. Service tokens arrive in `x-api-token` and are checked against a
//! separate secret only.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use gatehouse_core::auth::AuthError;
use gatehouse_core::auth::jwt::SessionClaims;

use crate::AppState;
use crate::error::AppError;

/// Header carrying end-user session tokens.
pub const USER_TOKEN_HEADER: &str = "x-auth-token";

/// Header carrying service-to-service tokens.
pub const SERVICE_TOKEN_HEADER: &str = "x-api-token";

/// Authenticated end user, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// Authenticated calling service, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedService {
    pub app_name: String,
}

fn header_token<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Axum middleware: validates the `x-auth-token` header against the live
/// session and injects `AuthenticatedUser` into request extensions.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = header_token(request.headers(), USER_TOKEN_HEADER).to_string();
    let validated = state.sessions.validate_token(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser {
        username: validated.subject,
    });

    Ok(next.run(request).await)
}

/// Axum middleware: verifies the `x-api-token` header and injects
/// `AuthenticatedService` into request extensions.
pub async fn require_service(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = header_token(request.headers(), SERVICE_TOKEN_HEADER);
    if token.is_empty() {
        return Err(AuthError::MissingToken.into());
    }
    let claims = state.service_codec.parse(token)?;

    request.extensions_mut().insert(AuthenticatedService {
        app_name: claims.subject().to_string(),
    });

    Ok(next.run(request).await)
}
