//! Credential store: durable subjects and their role grants.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{AuthError, queries};
use crate::models::auth::{User, UserWithPassword};

/// Durable user and role records, looked up by exact username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, AuthError>;

    /// Fails with `ValidationError` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AuthError>;

    /// Fails with `NotFound` for an unknown user. Removes the user's roles too.
    async fn delete_user(&self, username: &str) -> Result<(), AuthError>;

    async fn find_roles(&self, username: &str) -> Result<Vec<String>, AuthError>;

    /// Fails with `DuplicateRole` when the grant already exists.
    async fn insert_role(&self, username: &str, role: &str) -> Result<(), AuthError>;
}

/// PostgreSQL credential store.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        queries::find_user_by_username(&self.pool, username).await
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AuthError> {
        queries::create_user(&self.pool, username, password_hash).await
    }

    async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        queries::delete_user(&self.pool, username).await
    }

    async fn find_roles(&self, username: &str) -> Result<Vec<String>, AuthError> {
        queries::find_roles(&self.pool, username).await
    }

    async fn insert_role(&self, username: &str, role: &str) -> Result<(), AuthError> {
        queries::insert_role(&self.pool, username, role).await
    }
}
