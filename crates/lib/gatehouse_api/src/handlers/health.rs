//! Liveness endpoint.

use axum::Json;

use crate::models::MessageResponse;

/// `GET /`: process is up.
pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new(""))
}
