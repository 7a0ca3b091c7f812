//! Role checks for already-authenticated subjects.
//!
//! Role data is never cached; every check reads the credential store.

use tracing::info;

use super::AuthError;
use super::store::CredentialStore;

/// All roles granted to `username`.
pub async fn list_roles(
    store: &dyn CredentialStore,
    username: &str,
) -> Result<Vec<String>, AuthError> {
    store.find_roles(username).await
}

/// Whether `username` holds `role` (exact, case-sensitive match).
pub async fn has_role(
    store: &dyn CredentialStore,
    username: &str,
    role: &str,
) -> Result<bool, AuthError> {
    let roles = store.find_roles(username).await?;
    Ok(roles.iter().any(|r| r == role))
}

/// Grant `role` to `username`, failing with `DuplicateRole` if already held.
///
/// The pre-check gives a clean error in the common case; the store's
/// uniqueness constraint settles concurrent grants.
pub async fn grant_role(
    store: &dyn CredentialStore,
    username: &str,
    role: &str,
) -> Result<(), AuthError> {
    if role.trim().is_empty() {
        return Err(AuthError::ValidationError("Role must not be empty".into()));
    }
    if has_role(store, username, role).await? {
        return Err(AuthError::DuplicateRole(role.to_string()));
    }
    store.insert_role(username, role).await?;
    info!(username, role, "granted role");
    Ok(())
}
