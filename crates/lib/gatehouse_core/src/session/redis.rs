//! Redis-backed session cache.
//!
//! Every command carries a deadline. A timed-out or failed command surfaces as
//! a [`CacheError`], never as a missing key, so an outage cannot be mistaken
//! for a revoked session.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use tracing::{debug, warn};

use super::{CacheError, SessionCache, SessionKey};

/// Default deadline for a single cache command.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Session cache over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisSessionCache {
    conn: MultiplexedConnection,
    op_timeout: Duration,
}

impl RedisSessionCache {
    /// Connect to `url` and verify the server answers `PING`.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid Redis URL: {e}")))?;

        let mut conn = with_deadline(op_timeout, client.get_multiplexed_async_connection()).await?;

        let pong: String =
            with_deadline(op_timeout, redis::cmd("PING").query_async(&mut conn)).await?;
        debug!(reply = %pong, "Redis connection established");

        Ok(Self { conn, op_timeout })
    }
}

/// Redis `EX` takes whole seconds; round up and never expire immediately.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("Redis command failed: {e}");
            Err(CacheError::Unavailable(e.to_string()))
        }
        Err(_) => {
            warn!(?deadline, "Redis command timed out");
            Err(CacheError::Timeout(deadline))
        }
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        with_deadline(self.op_timeout, conn.get::<_, Option<String>>(key.as_str())).await
    }

    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        with_deadline(
            self.op_timeout,
            conn.set_ex::<_, _, ()>(key.as_str(), value, ttl_secs(ttl)),
        )
        .await
    }

    async fn set_if_absent(
        &self,
        key: &SessionKey,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key.as_str())
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl));
        // Nil reply when the key already exists.
        let reply: Option<String> =
            with_deadline(self.op_timeout, cmd.query_async(&mut conn)).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let removed: i64 = with_deadline(self.op_timeout, conn.del(key.as_str())).await?;
        debug!(key = %key, removed, "deleted session record");
        Ok(())
    }
}
