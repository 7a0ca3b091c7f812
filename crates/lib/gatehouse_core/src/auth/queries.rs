//! Auth-related database queries.
//!
//! Every lookup is an exact match on `username`.

use sqlx::PgPool;

use super::AuthError;
use crate::models::auth::{User, UserWithPassword};

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Fetch a user and their password hash by username.
pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserWithPassword>, AuthError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT username, password_hash FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(username, password_hash)| UserWithPassword {
        user: User { username },
        password_hash,
    }))
}

/// Create a new user.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
) -> Result<User, AuthError> {
    let username = sqlx::query_scalar::<_, String>(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING username",
    )
    .bind(username)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AuthError::ValidationError("Username already registered".into())
        } else {
            AuthError::DbError(e)
        }
    })?;
    Ok(User { username })
}

/// Delete a user. Role grants go with it via `ON DELETE CASCADE`.
pub async fn delete_user(pool: &PgPool, username: &str) -> Result<(), AuthError> {
    let result = sqlx::query("DELETE FROM users WHERE username = $1")
        .bind(username)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::NotFound(format!("user '{username}'")));
    }
    Ok(())
}

/// Fetch role names granted to a user, oldest grant first.
pub async fn find_roles(pool: &PgPool, username: &str) -> Result<Vec<String>, AuthError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT role FROM user_roles WHERE username = $1 ORDER BY id",
    )
    .bind(username)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Grant a role to a user.
pub async fn insert_role(pool: &PgPool, username: &str, role: &str) -> Result<(), AuthError> {
    sqlx::query("INSERT INTO user_roles (username, role) VALUES ($1, $2)")
        .bind(username)
        .bind(role)
        .execute(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AuthError::DuplicateRole(role.to_string())
            } else {
                AuthError::DbError(e)
            }
        })?;
    Ok(())
}
