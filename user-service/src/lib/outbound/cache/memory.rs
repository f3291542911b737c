use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::user::errors::CacheError;
use crate::user::ports::UserCache;

#[derive(Clone, Debug)]
struct CachedEntry {
    value: String,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Writes between two sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

/// Single-instance cache backed by a `DashMap`.
///
/// Expired entries are dropped on read, and every [`SWEEP_INTERVAL`] writes
/// the whole map is swept so keys that are never read again do not pile up.
#[derive(Default)]
pub struct InMemoryUserCache {
    entries: DashMap<String, CachedEntry>,
    writes: AtomicU64,
}

impl InMemoryUserCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        tracing::debug!(evicted = before.saturating_sub(self.entries.len()), "cache swept");
    }
}

#[async_trait]
impl UserCache for InMemoryUserCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Only an entry that is still expired is removed, never a fresh one
        // written in between
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            CachedEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep_expired();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
