//! Bounded per-process cache of staging metadata with hit/miss tracking.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::SecretDescription;
use crate::identifiers::SecretId;

/// Recency-evicted cache of [`SecretDescription`]s keyed by secret id
///
/// Entries are only valid within one rotation invocation; the store drops
/// them on request and after each of its own writes.
pub struct StagingMetadataCache {
    entries: Mutex<LruCache<SecretId, Arc<SecretDescription>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    capacity: NonZeroUsize,
}

impl StagingMetadataCache {
    /// A zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            capacity,
        }
    }

    pub async fn get(&self, secret_id: &SecretId) -> Option<Arc<SecretDescription>> {
        let mut entries = self.entries.lock().await;
        match entries.get(secret_id) {
            Some(description) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(description))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, description: SecretDescription) -> Arc<SecretDescription> {
        let description = Arc::new(description);
        self.entries
            .lock()
            .await
            .put(description.secret_id.clone(), Arc::clone(&description));
        description
    }

    pub async fn invalidate(&self, secret_id: &SecretId) {
        self.entries.lock().await.pop(secret_id);
    }

    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.lock().await.len(),
            capacity: self.capacity.get(),
        }
    }
}

/// Cache performance statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Hits over lookups, 0.0 before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
