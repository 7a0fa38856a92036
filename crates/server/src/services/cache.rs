//! Write-invalidated key-value cache.
//!
//! Backed by `moka` with no TTL: entries leave the cache only when a write
//! path deletes them or, if a capacity is configured, when moka evicts them.
//! Evictions are counted and logged.
//!
//! Read-through happens at the call site: check [`KeyedCache::get`], on a
//! miss read the store and populate with [`KeyedCache::set_if_current`]
//! using the [`KeyedCache::epoch`] observed *before* the store read. A
//! delete that lands between the read and the populate bumps the epoch and
//! the stale value is discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::notification::RemovalCause;
use moka::sync::Cache;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Cache key holding every active product.
pub const ALL_PRODUCTS_KEY: &str = "all_products";

/// Cache key for a single product.
#[must_use]
pub fn product_key(id: impl std::fmt::Display) -> String {
    format!("product_{id}")
}

/// String-keyed cache of cloneable values.
pub struct KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<String, V>,
    /// Bumped by every delete. Guards set/delete so each is atomic against the other.
    epoch: Mutex<u64>,
    evictions: Arc<AtomicU64>,
    capacity: Option<u64>,
}

impl<V> KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a cache holding at most `capacity` entries, or unbounded for `None`.
    #[must_use]
    pub fn with_capacity(capacity: Option<u64>) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);

        let mut builder = Cache::builder().eviction_listener(
            move |key: Arc<String>, _value: V, cause: RemovalCause| {
                if cause.was_evicted() {
                    counter.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, ?cause, "Cache entry evicted");
                }
            },
        );
        if let Some(max) = capacity {
            builder = builder.max_capacity(max);
        }

        Self {
            entries: builder.build(),
            epoch: Mutex::new(0),
            evictions,
            capacity,
        }
    }

    /// Cached value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key)
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let _guard = self.epoch.lock();
        self.entries.insert(key.into(), value);
    }

    /// Insert `key` only if no delete happened since `observed_epoch`.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_current(&self, key: impl Into<String>, value: V, observed_epoch: u64) -> bool {
        let epoch = self.epoch.lock();
        if *epoch != observed_epoch {
            debug!(
                observed_epoch,
                current_epoch = *epoch,
                "Skipping cache populate after concurrent invalidation"
            );
            return false;
        }
        self.entries.insert(key.into(), value);
        true
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete(&self, key: &str) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.entries.invalidate(key);
        debug!(key, "Cache entry invalidated");
    }

    /// Remove every key in `keys` under one lock acquisition.
    pub fn delete_many<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        for key in keys {
            self.entries.invalidate(key);
            debug!(key, "Cache entry invalidated");
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.entries.invalidate_all();
        debug!("Cache cleared");
    }

    /// Whether `key` is cached.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Current invalidation epoch; capture it before a read-through store query.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Number of cached entries after pending maintenance has run.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries evicted by the capacity bound so far.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Configured capacity bound, if any.
    #[must_use]
    pub const fn capacity(&self) -> Option<u64> {
        self.capacity
    }
}

impl<V> Default for KeyedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
