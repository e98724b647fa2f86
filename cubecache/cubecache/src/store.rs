//! The shared bounded store behind the cache manager.
//!
//! A weighted `moka` cache holds every category of entry. The store's own
//! evictions (capacity or expiry) are only recorded here; the manager drains
//! them and applies the dependency cleanup itself, so cleanup never runs on
//! the store's housekeeping path.

use crate::entry::CacheValue;
use crate::keys::{CacheKey, Category};
use cubecache_core::config::CacheConfig;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use moka::Expiry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Per-category time-to-live.
#[derive(Debug, Clone, Copy, Default)]
struct CategoryExpiry {
    file_list: Option<Duration>,
    last_modified: Option<Duration>,
    metadata: Option<Duration>,
    data: Option<Duration>,
}

impl CategoryExpiry {
    fn from_config(config: &CacheConfig) -> Self {
        Self {
            file_list: config.expirations.file_list(),
            last_modified: config.expirations.last_modified(),
            metadata: config.expirations.metadata(),
            data: config.expirations.data(),
        }
    }

    fn ttl(&self, category: Category) -> Option<Duration> {
        match category {
            Category::FileList => self.file_list,
            Category::LastModified => self.last_modified,
            Category::Metadata => self.metadata,
            Category::Data => self.data,
        }
    }
}

impl Expiry<CacheKey, CacheValue> for CategoryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.ttl(value.category())
    }

    // An overwrite starts a fresh lifetime
    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.ttl(value.category())
    }
}

type EvictionQueue = Arc<Mutex<Vec<(CacheKey, CacheValue)>>>;

pub(crate) struct CacheStore {
    cache: Cache<CacheKey, CacheValue>,
    evicted: EvictionQueue,
}

impl CacheStore {
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let evicted: EvictionQueue = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::clone(&evicted);

        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .weigher(|_key: &CacheKey, value: &CacheValue| value.weight())
            .expire_after(CategoryExpiry::from_config(config))
            .eviction_listener(move |key: Arc<CacheKey>, value: CacheValue, cause: RemovalCause| {
                if cause.was_evicted() {
                    trace!("Store evicted {} ({:?})", key, cause);
                    queue.lock().push((*key, value));
                }
            })
            .build();

        Self { cache, evicted }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.get(key)
    }

    /// Insert `value`, returning the entry it replaced.
    pub(crate) fn insert(&self, key: CacheKey, value: CacheValue) -> Option<CacheValue> {
        let previous = self.cache.get(&key);
        self.cache.insert(key, value);
        previous
    }

    pub(crate) fn remove(&self, key: &CacheKey) -> Option<CacheValue> {
        self.cache.remove(key)
    }

    /// Take every store-initiated eviction recorded since the last call.
    pub(crate) fn take_evicted(&self) -> Vec<(CacheKey, CacheValue)> {
        std::mem::take(&mut *self.evicted.lock())
    }

    pub(crate) fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    pub(crate) fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub(crate) fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }
}
