//! User account and session handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    CredentialsRequest, MessageResponse, SessionDeletedResponse, TokenResponse,
    UserDeletedResponse,
};
use crate::services::auth;

/// `POST /register`: create a user and issue a session token.
pub async fn register_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<CredentialsRequest>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let token = auth::register(
        state.store.as_ref(),
        &state.sessions,
        &body.username,
        &body.password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// `POST /login`: authenticate and return the live session token.
pub async fn login_handler(
    State(state): State<AppState>,
    AppJson(body): AppJson<CredentialsRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = auth::login(
        state.store.as_ref(),
        &state.sessions,
        &body.username,
        &body.password,
    )
    .await?;
    Ok(Json(TokenResponse { token }))
}

/// `GET /verify`: the middleware already accepted the token.
pub async fn verify_handler(
    Extension(_user): Extension<AuthenticatedUser>,
) -> Json<MessageResponse> {
    Json(MessageResponse::new("success"))
}

/// `DELETE /`: delete the caller's account and end their session.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserDeletedResponse>> {
    auth::delete_account(state.store.as_ref(), &state.sessions, &user.username).await?;
    Ok(Json(UserDeletedResponse {
        deleted_user: user.username,
    }))
}

/// `DELETE /session`: logout.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<SessionDeletedResponse>> {
    auth::logout(&state.sessions, &user.username).await?;
    Ok(Json(SessionDeletedResponse {
        deleted_session_for: user.username,
    }))
}
