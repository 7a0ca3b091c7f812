//! Session-bound token lifecycle: issuance, validation, revocation.
//!
//! A token is valid only when its signature verifies, it has not expired, and
//! it is byte-identical to the record held in the session cache under its
//! subject's key.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::{SessionCache, SessionKey};
use crate::auth::AuthError;
use crate::auth::jwt::{SessionClaims, UserTokenCodec, expiry_datetime};

/// Token lifetime: 8 hours.
pub const TOKEN_LIFETIME_SECS: i64 = 8 * 60 * 60;

/// Extra cache lifetime granted on top of the time left until token expiry.
pub const CACHE_MARGIN_SECS: i64 = 5 * 60;

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub subject: String,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

/// Sole authority on which token is live for a subject.
#[derive(Clone)]
pub struct SessionManager {
    cache: Arc<dyn SessionCache>,
    codec: UserTokenCodec,
    token_lifetime: Duration,
    cache_margin: Duration,
}

impl SessionManager {
    pub fn new(cache: Arc<dyn SessionCache>, codec: UserTokenCodec) -> Self {
        Self {
            cache,
            codec,
            token_lifetime: Duration::seconds(TOKEN_LIFETIME_SECS),
            cache_margin: Duration::seconds(CACHE_MARGIN_SECS),
        }
    }

    /// Override the token lifetime.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    pub fn codec(&self) -> &UserTokenCodec {
        &self.codec
    }

    /// Return the subject's live token, minting and recording one if none exists.
    ///
    /// Repeated calls within the session window return the same token. A cache
    /// fault fails the call; a token is never returned unless it is recorded.
    ///
    /// The cache record outlives its token by the cache margin. A recorded
    /// token that no longer parses (expired, or signed with a rotated secret)
    /// is replaced rather than handed out.
    pub async fn issue_token(&self, subject: &str) -> Result<String, AuthError> {
        let key = SessionKey::for_subject(subject);

        let stale = match self.cache.get(&key).await? {
            Some(existing) if !existing.is_empty() => match self.codec.parse(&existing) {
                Ok(_) => {
                    debug!(subject, "reusing live session token");
                    return Ok(existing);
                }
                Err(AuthError::MalformedToken(reason)) => {
                    debug!(subject, %reason, "replacing unusable session token");
                    true
                }
                Err(e) => return Err(e),
            },
            Some(_) => true,
            None => false,
        };

        let expires_at = Utc::now() + self.token_lifetime;
        let token = self.codec.mint(subject, expires_at)?;

        let ttl = (expires_at - (Utc::now() - self.cache_margin))
            .to_std()
            .map_err(|e| AuthError::Internal(format!("session ttl: {e}")))?;

        // A stale record still occupies the key, so it is overwritten outright.
        if stale {
            self.cache.set(&key, &token, ttl).await?;
            info!(subject, %expires_at, "issued session token");
            return Ok(token);
        }

        if self.cache.set_if_absent(&key, &token, ttl).await? {
            info!(subject, %expires_at, "issued session token");
            return Ok(token);
        }

        // Another issuer recorded a session first; its token is the live one.
        match self.cache.get(&key).await? {
            Some(winner) if !winner.is_empty() => {
                debug!(subject, "concurrent issuance won by another request");
                Ok(winner)
            }
            _ => {
                self.cache.set(&key, &token, ttl).await?;
                info!(subject, %expires_at, "issued session token");
                Ok(token)
            }
        }
    }

    /// Resolve a raw token to its subject if, and only if, it is the live one.
    pub async fn validate_token(&self, raw_token: &str) -> Result<ValidatedToken, AuthError> {
        if raw_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.codec.parse(raw_token)?;
        let subject = claims.subject();
        let key = SessionKey::for_subject(subject);

        match self.cache.get(&key).await? {
            None => {
                debug!(subject, "no live session for token");
                Err(AuthError::Forbidden)
            }
            Some(live) if live.as_bytes() != raw_token.as_bytes() => {
                debug!(subject, "token superseded by a newer session");
                Err(AuthError::Forbidden)
            }
            Some(_) => Ok(ValidatedToken {
                subject: subject.to_string(),
                expires_at: expiry_datetime(claims.expires_at())?,
                valid: true,
            }),
        }
    }

    /// Delete the subject's session record. Succeeds when there is none.
    pub async fn revoke_session(&self, subject: &str) -> Result<(), AuthError> {
        self.cache.delete(&SessionKey::for_subject(subject)).await?;
        info!(subject, "revoked session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;

    use super::*;
    use crate::session::{CacheError, MemorySessionCache};

    const SECRET: &[u8] = b"session-test-secret";

    fn manager() -> (SessionManager, Arc<MemorySessionCache>) {
        let cache = Arc::new(MemorySessionCache::new());
        let manager = SessionManager::new(cache.clone(), UserTokenCodec::new(SECRET));
        (manager, cache)
    }

    /// Cache whose every call fails as if the server were down.
    struct DownCache;

    #[async_trait]
    impl SessionCache for DownCache {
        async fn get(&self, _key: &SessionKey) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _: &SessionKey, _: &str, _: StdDuration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set_if_absent(
            &self,
            _: &SessionKey,
            _: &str,
            _: StdDuration,
        ) -> Result<bool, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &SessionKey) -> Result<(), CacheError> {
            Err(CacheError::Timeout(StdDuration::from_secs(2)))
        }
    }

    /// Cache that reads fine but refuses writes.
    struct ReadOnlyCache(MemorySessionCache);

    #[async_trait]
    impl SessionCache for ReadOnlyCache {
        async fn get(&self, key: &SessionKey) -> Result<Option<String>, CacheError> {
            self.0.get(key).await
        }

        async fn set(&self, _: &SessionKey, _: &str, _: StdDuration) -> Result<(), CacheError> {
            Err(CacheError::Timeout(StdDuration::from_secs(2)))
        }

        async fn set_if_absent(
            &self,
            _: &SessionKey,
            _: &str,
            _: StdDuration,
        ) -> Result<bool, CacheError> {
            Err(CacheError::Timeout(StdDuration::from_secs(2)))
        }

        async fn delete(&self, key: &SessionKey) -> Result<(), CacheError> {
            self.0.delete(key).await
        }
    }

    /// Cache where a rival request records its session between our read and write.
    struct RacingCache {
        inner: MemorySessionCache,
        raced: AtomicBool,
    }

    #[async_trait]
    impl SessionCache for RacingCache {
        async fn get(&self, key: &SessionKey) -> Result<Option<String>, CacheError> {
            self.inner.get(key).await
        }

        async fn set(
            &self,
            key: &SessionKey,
            value: &str,
            ttl: StdDuration,
        ) -> Result<(), CacheError> {
            self.inner.set(key, value, ttl).await
        }

        async fn set_if_absent(
            &self,
            key: &SessionKey,
            value: &str,
            ttl: StdDuration,
        ) -> Result<bool, CacheError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.inner.set(key, "rival-token", ttl).await?;
            }
            self.inner.set_if_absent(key, value, ttl).await
        }

        async fn delete(&self, key: &SessionKey) -> Result<(), CacheError> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn issue_records_token_under_subject_key() {
        let (manager, cache) = manager();
        let token = manager.issue_token("alice").await.unwrap();

        let stored = cache.get(&SessionKey::for_subject("alice")).await.unwrap();
        assert_eq!(stored.as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn issue_is_idempotent_while_session_is_live() {
        let (manager, cache) = manager();
        let first = manager.issue_token("alice").await.unwrap();
        let second = manager.issue_token("alice").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn issue_token_expires_eight_hours_out() {
        let (manager, _) = manager();
        let before = Utc::now();
        let token = manager.issue_token("alice").await.unwrap();
        let validated = manager.validate_token(&token).await.unwrap();

        let lifetime = validated.expires_at - before;
        assert!(lifetime <= Duration::hours(8) + Duration::seconds(1));
        assert!(lifetime > Duration::hours(8) - Duration::seconds(5));
    }

    #[tokio::test]
    async fn issue_replaces_empty_cache_value() {
        let (manager, cache) = manager();
        let key = SessionKey::for_subject("alice");
        cache.set(&key, "", StdDuration::from_secs(60)).await.unwrap();

        let token = manager.issue_token("alice").await.unwrap();
        assert!(!token.is_empty());
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn issue_fails_when_cache_unreachable() {
        let manager = SessionManager::new(Arc::new(DownCache), UserTokenCodec::new(SECRET));
        let err = manager.issue_token("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::Cache(CacheError::Unavailable(_))));
    }

    #[tokio::test]
    async fn issue_fails_when_token_cannot_be_recorded() {
        let manager = SessionManager::new(
            Arc::new(ReadOnlyCache(MemorySessionCache::new())),
            UserTokenCodec::new(SECRET),
        );
        let err = manager.issue_token("alice").await.unwrap_err();
        assert!(matches!(err, AuthError::Cache(CacheError::Timeout(_))));
    }

    #[tokio::test]
    async fn concurrent_issuer_returns_winning_token() {
        let cache = Arc::new(RacingCache {
            inner: MemorySessionCache::new(),
            raced: AtomicBool::new(false),
        });
        let manager = SessionManager::new(cache.clone(), UserTokenCodec::new(SECRET));

        let token = manager.issue_token("alice").await.unwrap();
        assert_eq!(token, "rival-token");
        assert_eq!(
            cache.get(&SessionKey::for_subject("alice")).await.unwrap().as_deref(),
            Some("rival-token")
        );
    }

    #[tokio::test]
    async fn validate_accepts_live_token() {
        let (manager, _) = manager();
        let token = manager.issue_token("alice").await.unwrap();

        let validated = manager.validate_token(&token).await.unwrap();
        assert_eq!(validated.subject, "alice");
        assert!(validated.valid);
    }

    #[tokio::test]
    async fn validate_rejects_empty_token_as_missing() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.validate_token("").await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn validate_rejects_garbage_as_malformed() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.validate_token("abc.def.ghi").await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn revoked_token_is_forbidden() {
        let (manager, _) = manager();
        let token = manager.issue_token("alice").await.unwrap();
        manager.revoke_session("alice").await.unwrap();

        // Signature and expiry are still fine; only liveness is gone.
        assert!(manager.codec().parse(&token).is_ok());
        assert!(matches!(
            manager.validate_token(&token).await,
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn superseded_token_is_forbidden() {
        let (manager, cache) = manager();
        let token = manager.issue_token("alice").await.unwrap();

        let newer = manager
            .codec()
            .mint("alice", Utc::now() + Duration::hours(2))
            .unwrap();
        assert_ne!(token, newer);
        cache
            .set(&SessionKey::for_subject("alice"), &newer, StdDuration::from_secs(60))
            .await
            .unwrap();

        assert!(manager.codec().parse(&token).is_ok());
        assert!(matches!(
            manager.validate_token(&token).await,
            Err(AuthError::Forbidden)
        ));
        assert_eq!(manager.validate_token(&newer).await.unwrap().subject, "alice");
    }

    #[tokio::test]
    async fn expired_token_fails_even_when_cached() {
        let (manager, cache) = manager();
        let expired = manager
            .codec()
            .mint("alice", Utc::now() - Duration::minutes(5))
            .unwrap();
        cache
            .set(&SessionKey::for_subject("alice"), &expired, StdDuration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            manager.validate_token(&expired).await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn validate_surfaces_cache_outage_distinctly() {
        let codec = UserTokenCodec::new(SECRET);
        let token = codec.mint("alice", Utc::now() + Duration::hours(1)).unwrap();
        let manager = SessionManager::new(Arc::new(DownCache), codec);

        let err = manager.validate_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Cache(_)));
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn token_from_foreign_secret_is_malformed() {
        let (manager, cache) = manager();
        let foreign = UserTokenCodec::new(b"someone-else")
            .mint("alice", Utc::now() + Duration::hours(1))
            .unwrap();
        cache
            .set(&SessionKey::for_subject("alice"), &foreign, StdDuration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            manager.validate_token(&foreign).await,
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let (manager, _) = manager();
        manager.revoke_session("alice").await.unwrap();
        manager.issue_token("alice").await.unwrap();
        manager.revoke_session("alice").await.unwrap();
        manager.revoke_session("alice").await.unwrap();
    }

    #[tokio::test]
    async fn revoke_propagates_cache_faults() {
        let manager = SessionManager::new(Arc::new(DownCache), UserTokenCodec::new(SECRET));
        assert!(matches!(
            manager.revoke_session("alice").await,
            Err(AuthError::Cache(CacheError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn new_session_after_logout_gets_fresh_token() {
        let (manager, _) = manager();

        let first = manager.issue_token("alice").await.unwrap();
        manager.revoke_session("alice").await.unwrap();
        let second = manager.issue_token("alice").await.unwrap();

        assert_ne!(first, second);
        assert!(manager.validate_token(&second).await.is_ok());
        assert!(matches!(
            manager.validate_token(&first).await,
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn relogin_within_same_second_never_revives_revoked_token() {
        let (manager, _) = manager();
        for _ in 0..5 {
            let revoked = manager.issue_token("alice").await.unwrap();
            manager.revoke_session("alice").await.unwrap();
            let fresh = manager.issue_token("alice").await.unwrap();

            assert_ne!(revoked, fresh);
            assert!(matches!(
                manager.validate_token(&revoked).await,
                Err(AuthError::Forbidden)
            ));
            manager.revoke_session("alice").await.unwrap();
        }
    }

    #[tokio::test]
    async fn expired_token_still_cached_is_replaced_on_issue() {
        let (manager, cache) = manager();
        let short = manager.with_token_lifetime(Duration::seconds(1));

        let expired = short.issue_token("alice").await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(2100)).await;
        let key = SessionKey::for_subject("alice");
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(expired.as_str()));

        let fresh = short.issue_token("alice").await.unwrap();
        assert_ne!(fresh, expired);
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(fresh.as_str()));
        assert_eq!(short.validate_token(&fresh).await.unwrap().subject, "alice");
    }

    #[tokio::test]
    async fn foreign_token_in_cache_is_replaced_on_issue() {
        let (manager, cache) = manager();
        let key = SessionKey::for_subject("alice");
        let foreign = UserTokenCodec::new(b"rotated-away")
            .mint("alice", Utc::now() + Duration::hours(1))
            .unwrap();
        cache.set(&key, &foreign, StdDuration::from_secs(60)).await.unwrap();

        let token = manager.issue_token("alice").await.unwrap();
        assert_ne!(token, foreign);
        assert!(manager.validate_token(&token).await.is_ok());
    }

    #[tokio::test]
    async fn alice_login_logout_scenario() {
        let (manager, cache) = manager();

        let t1 = manager.issue_token("alice").await.unwrap();
        assert_eq!(
            cache.get(&SessionKey::for_subject("alice")).await.unwrap().as_deref(),
            Some(t1.as_str())
        );

        let again = manager.issue_token("alice").await.unwrap();
        assert_eq!(again, t1);

        assert_eq!(manager.validate_token(&t1).await.unwrap().subject, "alice");

        manager.revoke_session("alice").await.unwrap();
        assert_eq!(cache.get(&SessionKey::for_subject("alice")).await.unwrap(), None);
        assert!(matches!(
            manager.validate_token(&t1).await,
            Err(AuthError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_subject() {
        let (manager, _) = manager();
        let alice = manager.issue_token("alice").await.unwrap();
        let bob = manager.issue_token("bob").await.unwrap();
        assert_ne!(alice, bob);

        manager.revoke_session("bob").await.unwrap();
        assert!(manager.validate_token(&alice).await.is_ok());
        assert!(manager.validate_token(&bob).await.is_err());
    }
}
