//! Authentication and authorization logic.
//!
//! Provides password hashing, token signing, the credential store and role
//! checks shared by `gatehouse_api` and the server binary.

pub mod jwt;
pub mod memory;
pub mod password;
pub mod queries;
pub mod roles;
pub mod store;

use thiserror::Error;

use crate::session::CacheError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Unable to parse token: {0}")]
    MalformedToken(String),

    /// No live session, or the live session holds a different token.
    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Role '{0}' already granted")]
    DuplicateRole(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Session cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the caller must re-authenticate, as opposed to an
    /// infrastructure fault that may be retried.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::MalformedToken(_)
                | AuthError::Forbidden
                | AuthError::CredentialError
        )
    }
}
