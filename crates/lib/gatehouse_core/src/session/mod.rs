//! Session cache and session lifecycle.
//!
//! The cache holds at most one live token per subject. A token is accepted
//! only while it is byte-identical to that record, so deleting the record
//! revokes the token immediately.

pub mod manager;
pub mod memory;
pub mod redis;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use manager::{SessionManager, ValidatedToken};
pub use memory::MemorySessionCache;
pub use redis::RedisSessionCache;

/// Session cache failures. A missing key is not an error; see [`SessionCache::get`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("session cache timed out after {0:?}")]
    Timeout(Duration),

    #[error("session cache unavailable: {0}")]
    Unavailable(String),
}

/// Cache key of a subject's session record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// The only way to build a session key, shared by issuance, validation
    /// and revocation.
    pub fn for_subject(subject: &str) -> Self {
        Self(format!("{subject}-token"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value store holding the live token per subject, with a TTL.
///
/// Implementations must be atomic per single key. Expired entries must be
/// indistinguishable from missing ones.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Fetch the stored token, `Ok(None)` when there is no record.
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, CacheError>;

    /// Store `value`, replacing any existing record.
    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store `value` only when no record exists. Returns whether it was stored.
    async fn set_if_absent(
        &self,
        key: &SessionKey,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Remove the record. Removing a missing key succeeds.
    async fn delete(&self, key: &SessionKey) -> Result<(), CacheError>;
}
