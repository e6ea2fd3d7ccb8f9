// In-process read cache with per-entry expiry

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Keyed cache whose entries live for a fixed time-to-live.
///
/// Clones share the same underlying map. Expired entries are dropped the
/// next time they are read.
#[derive(Debug, Clone)]
pub struct TtlCache<V> {
    store: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let store = self.read();
        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                metrics::counter!("bakery_ledger.cache.hits", 1);
                Some(entry.value.clone())
            }
            Some(_) => {
                drop(store);
                self.write().remove(key);
                metrics::counter!("bakery_ledger.cache.misses", 1);
                None
            }
            None => {
                metrics::counter!("bakery_ledger.cache.misses", 1);
                None
            }
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.write()
            .insert(key.into(), CacheEntry::new(value, self.ttl));
    }

    /// Drops every entry whose key starts with `prefix`; returns how many went.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut store = self.write();
        let before = store.len();
        store.retain(|key, _| !key.starts_with(prefix));
        before - store.len()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
