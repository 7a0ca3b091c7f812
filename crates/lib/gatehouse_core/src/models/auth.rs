//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request and
//! response shapes in `gatehouse_api`.

use serde::{Deserialize, Serialize};

/// Domain user. The username is unique and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// Claims embedded in end-user session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject username.
    pub username: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Random per-mint identifier; two mints never produce the same token.
    pub jti: String,
}

/// Claims embedded in service-to-service tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaims {
    /// Name of the calling application.
    #[serde(rename = "appName")]
    pub app_name: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub jti: String,
}
