//! Signed token minting and parsing.
//!
//! A [`TokenCodec`] checks signature and expiry only. Whether a token is the
//! live one for its subject is decided by
//! [`SessionManager`](crate::session::SessionManager).

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use super::AuthError;
use crate::models::auth::{ServiceClaims, UserClaims};

/// Env var holding the end-user signing secret.
pub const USER_SECRET_ENV: &str = "JWT_SECRET";

/// Env var holding the service-to-service signing secret.
pub const SERVICE_SECRET_ENV: &str = "JWT_APP_SECRET";

/// Length of the random `jti` stamped into every minted token.
const TOKEN_ID_LEN: usize = 22;

/// Fixed-shape claims carried by a token: a subject, an absolute expiry and a
/// per-mint identifier.
pub trait SessionClaims: Serialize + DeserializeOwned {
    fn new(subject: &str, expires_at: i64, token_id: String) -> Self;

    fn subject(&self) -> &str;

    /// Expiry as a unix timestamp (seconds).
    fn expires_at(&self) -> i64;
}

impl SessionClaims for UserClaims {
    fn new(subject: &str, expires_at: i64, token_id: String) -> Self {
        Self {
            username: subject.to_string(),
            exp: expires_at,
            jti: token_id,
        }
    }

    fn subject(&self) -> &str {
        &self.username
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl SessionClaims for ServiceClaims {
    fn new(subject: &str, expires_at: i64, token_id: String) -> Self {
        Self {
            app_name: subject.to_string(),
            exp: expires_at,
            jti: token_id,
        }
    }

    fn subject(&self) -> &str {
        &self.app_name
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// HS256 codec bound to one secret and one claims shape.
pub struct TokenCodec<C> {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    _claims: PhantomData<fn() -> C>,
}

/// Codec for end-user session tokens (`x-auth-token`).
pub type UserTokenCodec = TokenCodec<UserClaims>;

/// Codec for service-to-service tokens (`x-api-token`).
pub type ServiceTokenCodec = TokenCodec<ServiceClaims>;

impl<C: SessionClaims> TokenCodec<C> {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            _claims: PhantomData,
        }
    }

    /// Sign a token for `subject` expiring at `expires_at`.
    ///
    /// Every call yields a distinct token, even for equal subject and expiry.
    /// Failures here are signing or encoding faults, never user errors.
    pub fn mint(&self, subject: &str, expires_at: DateTime<Utc>) -> Result<String, AuthError> {
        let token_id = random_alphanumeric(TOKEN_ID_LEN);
        let claims = C::new(subject, expires_at.timestamp(), token_id);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry, returning the decoded claims.
    pub fn parse(&self, token: &str) -> Result<C, AuthError> {
        decode::<C>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired".to_string(),
                    ErrorKind::InvalidSignature => "signature mismatch".to_string(),
                    other => format!("{other:?}"),
                };
                AuthError::MalformedToken(reason)
            })
    }
}

impl<C> Clone for TokenCodec<C> {
    fn clone(&self) -> Self {
        Self {
            encoding: self.encoding.clone(),
            decoding: self.decoding.clone(),
            validation: self.validation.clone(),
            _claims: PhantomData,
        }
    }
}

impl<C> fmt::Debug for TokenCodec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("claims", &std::any::type_name::<C>())
            .finish_non_exhaustive()
    }
}

/// Convert a claims expiry back to a timestamp.
pub fn expiry_datetime(exp: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| AuthError::MalformedToken(format!("exp out of range: {exp}")))
}

/// Resolve a signing secret: env var `env_var` → persisted file → generated.
///
/// Generated secrets are written to `<data_dir>/gatehouse/<file_name>` so
/// tokens survive restarts.
pub fn resolve_secret(env_var: &str, file_name: &str) -> String {
    if let Ok(secret) = std::env::var(env_var)
        && !secret.is_empty()
    {
        return secret;
    }
    resolve_secret_at(&secret_path(file_name))
}

/// Read the secret persisted at `path`, generating and persisting one if absent.
pub fn resolve_secret_at(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = random_alphanumeric(64);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    info!(path = %path.display(), "generated new signing secret");
    secret
}

fn random_alphanumeric(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gatehouse")
        .join(file_name)
}
