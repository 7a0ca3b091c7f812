//! Role handlers for the authenticated caller.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use gatehouse_core::auth::roles;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{HasRoleResponse, RoleAddedResponse, RoleRequest, RolesResponse};

/// `GET /roles`: list the caller's roles.
pub async fn list_roles_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<RolesResponse>> {
    let roles = roles::list_roles(state.store.as_ref(), &user.username).await?;
    Ok(Json(RolesResponse {
        username: user.username,
        roles,
    }))
}

/// `GET /roles/{role}`: does the caller hold `role`?
pub async fn has_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(role): Path<String>,
) -> AppResult<Json<HasRoleResponse>> {
    let has_role = roles::has_role(state.store.as_ref(), &user.username, &role).await?;
    Ok(Json(HasRoleResponse { role, has_role }))
}

/// `POST /roles`: grant a role to the caller.
pub async fn add_role_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AppJson(body): AppJson<RoleRequest>,
) -> AppResult<(StatusCode, Json<RoleAddedResponse>)> {
    roles::grant_role(state.store.as_ref(), &user.username, &body.role).await?;
    Ok((
        StatusCode::CREATED,
        Json(RoleAddedResponse {
            added_role: body.role,
        }),
    ))
}
