//! Account flows: register, login, logout and deletion.
//!
//! Each flow resolves a subject through the credential store and hands token
//! work to the `SessionManager`.

use gatehouse_core::auth::AuthError;
use gatehouse_core::auth::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use gatehouse_core::auth::store::CredentialStore;
use gatehouse_core::session::SessionManager;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Register a new user and issue their first session token.
pub async fn register(
    store: &dyn CredentialStore,
    sessions: &SessionManager,
    username: &str,
    password: &str,
) -> AppResult<String> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("Username must not be empty".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let pw_hash = hash_password(password)?;
    let user = store.create_user(username, &pw_hash).await?;
    info!(username = %user.username, "registered user");

    Ok(sessions.issue_token(&user.username).await?)
}

/// Authenticate with username + password, returning the live session token.
///
/// Unknown users and wrong passwords get the same error.
pub async fn login(
    store: &dyn CredentialStore,
    sessions: &SessionManager,
    username: &str,
    password: &str,
) -> AppResult<String> {
    let Some(found) = store.find_user_by_username(username).await? else {
        return Err(AuthError::CredentialError.into());
    };

    if !verify_password(password, &found.password_hash)? {
        return Err(AuthError::CredentialError.into());
    }

    Ok(sessions.issue_token(&found.user.username).await?)
}

/// Logout: revoke the subject's session. Logging out twice is fine.
pub async fn logout(sessions: &SessionManager, username: &str) -> AppResult<()> {
    sessions.revoke_session(username).await?;
    Ok(())
}

/// Delete a user: revoke the session first so the token dies with the account.
pub async fn delete_account(
    store: &dyn CredentialStore,
    sessions: &SessionManager,
    username: &str,
) -> AppResult<()> {
    sessions.revoke_session(username).await?;
    store.delete_user(username).await?;
    info!(username, "deleted user");
    Ok(())
}
