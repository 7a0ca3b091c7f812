//! Service-to-service handlers, authenticated by `x-api-token`.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedService;
use crate::models::{MessageResponse, UserDeletedResponse};
use crate::services::auth;

/// `GET /app/verify`: the calling service's token is valid.
pub async fn app_verify_handler(
    Extension(_service): Extension<AuthenticatedService>,
) -> Json<MessageResponse> {
    Json(MessageResponse::new("success"))
}

/// `DELETE /app/user/{username}`: delete a user on behalf of a service.
pub async fn app_delete_user_handler(
    State(state): State<AppState>,
    Extension(service): Extension<AuthenticatedService>,
    Path(username): Path<String>,
) -> AppResult<Json<UserDeletedResponse>> {
    auth::delete_account(state.store.as_ref(), &state.sessions, &username).await?;
    info!(app = %service.app_name, username = %username, "user deleted by service");
    Ok(Json(UserDeletedResponse {
        deleted_user: username,
    }))
}
