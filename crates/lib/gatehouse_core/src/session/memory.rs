//! In-process session cache with per-entry expiry.
//!
//! Used by tests and by the server's ephemeral mode.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CacheError, SessionCache, SessionKey};

/// A cached token with expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Session cache backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, CacheError> {
        let live = self
            .entries
            .get(key.as_str())
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone());
        if live.is_none() {
            self.entries
                .remove_if(key.as_str(), |_, entry| !entry.is_live());
        }
        Ok(live)
    }

    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.as_str().to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &SessionKey,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        match self.entries.entry(key.as_str().to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    Ok(false)
                } else {
                    occupied.insert(CacheEntry::new(value, ttl));
                    Ok(true)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), CacheError> {
        self.entries.remove(key.as_str());
        Ok(())
    }
}
