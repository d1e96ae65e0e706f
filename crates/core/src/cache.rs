//! Fixed-capacity keyed cache with least-recently-used eviction.
//!
//! [`BoundedCache`] is a thin wrapper over [`lru::LruCache`] that pins down
//! the contract the recorder relies on: `get` refreshes recency, `put`
//! silently drops the least-recently-used entry at capacity, and `contains`
//! does not touch recency. Capacity is fixed at construction.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// A bounded key/value mapping with LRU eviction.
///
/// All operations are O(1) amortized. The cache performs no interior
/// locking; callers that share it across contexts must serialize access
/// themselves.
#[derive(Debug)]
pub struct BoundedCache<K: Hash + Eq, V> {
    inner: LruCache<K, V>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// Panics if `capacity` is zero; a zero-capacity cache is always a
    /// configuration mistake and should fail at startup.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self {
            inner: LruCache::new(capacity),
        }
    }

    /// Look up `key`, marking the entry as most recently used on a hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// Insert or replace the entry for `key`.
    ///
    /// When the cache is full, the least-recently-used entry is dropped.
    pub fn put(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    /// Remove the entry for `key`, returning its value if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    /// Whether `key` is present, without refreshing its recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The fixed capacity set at construction.
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}
