//! Per-key async mutual exclusion
//!
//! Events for one call (or payment) are serialized in-process before they
//! reach the database, so concurrent deliveries queue on a mutex instead of
//! contending on a row lock. Keys hash onto a fixed set of shards; two keys
//! may share a shard, which only costs parallelism.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

pub struct KeyedLocks {
    shards: Vec<Mutex<()>>,
}

impl KeyedLocks {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.shard_for(key)].lock().await
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new(64)
    }
}
