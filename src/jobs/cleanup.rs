//! Background job: sweep expired entries out of the in-memory store.
//!
//! Redis expires keys itself; only the development `MemoryStore` needs this.

use std::time::Duration;
use tokio::time;

use crate::store::MemoryStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the background sweep task. Call this once at startup.
pub fn spawn(store: MemoryStore) {
    tokio::spawn(async move {
        let mut interval = time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = store.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = store.len(), "swept expired store entries");
            }
        }
    });
}
