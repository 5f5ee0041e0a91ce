//! Ephemeral key-value storage for OAuth state and credentials.
//!
//! Values are opaque strings; callers own (de)serialization. Every write
//! carries a TTL and expiry is the only cleanup mechanism.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async string-keyed store with per-entry expiry.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> StoreResult<()>;

    /// Returns `None` for missing or expired keys.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Liveness probe used by the readiness endpoint.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
