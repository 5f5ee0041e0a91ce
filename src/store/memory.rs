use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{KvStore, StoreResult};

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store backed by a DashMap.
///
/// Expired entries are dropped lazily on read. `evict_expired()` sweeps the
/// whole map and is cheap enough to call from a periodic task.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Roughly thirty years; stands in for TTLs that overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

fn expiry(ttl_secs: u64) -> Instant {
    let now = Instant::now();
    now.checked_add(Duration::from_secs(ttl_secs))
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expiry(ttl_secs),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            // expired — drop the ref before removing
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites_previous_value() {
        let store = MemoryStore::new();
        store.set("k", "first", 60).await.unwrap();
        store.set("k", "second", 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("second".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_entry_is_expired_on_read() {
        let store = MemoryStore::new();
        store.set("k", "v", 0).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // lazy eviction removed it
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_evict_expired_keeps_live_entries() {
        let store = MemoryStore::new();
        store.set("dead", "v", 0).await.unwrap();
        store.set("live", "v", 600).await.unwrap();

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let store = MemoryStore::new();
        store.set("k", "v", u64::MAX).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.evict_expired(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("nope").await.is_ok());
    }
}
