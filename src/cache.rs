//! # Layout Cache
//!
//! Memoization for the three values a layout pass asks for over and over:
//! node sizes, subtree vertical bounds and visible subtree node counts.
//!
//! Each cache is a bounded LRU whose entries also expire after a TTL. An
//! expired entry reads as a miss and is removed on the spot; a periodic
//! sweep purges the rest. The caches sit behind separate mutexes that are
//! only held for a single lookup or insert, never while a value is being
//! computed, so recursive computations (subtree bounds) can re-enter freely.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;

use crate::clock::Clock;
use crate::geometry::Bounds;
use crate::model::{CacheConfig, NodeId, NodeKind};
use crate::size::NodeSize;

/// Statistics about cache performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Current number of entries.
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache whose entries also expire `ttl` after insertion.
///
/// Time is passed in by the caller as a [`Duration`] since an arbitrary
/// origin, so the cache itself never reads a clock.
#[derive(Debug)]
pub struct TtlLruCache<K: Hash + Eq, V> {
    entries: LruCache<K, (V, Duration)>,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlLruCache<K, V> {
    /// A zero capacity is raised to 1.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
        }
    }

    fn expired(&self, inserted: Duration, now: Duration) -> bool {
        now.saturating_sub(inserted) > self.ttl
    }

    /// Look up `key`, refreshing its recency. Expired entries are removed
    /// and count as misses.
    pub fn get(&mut self, key: &K, now: Duration) -> Option<V> {
        let ttl = self.ttl;
        let fresh = match self.entries.get(key) {
            Some((value, inserted)) => {
                (now.saturating_sub(*inserted) <= ttl).then(|| value.clone())
            }
            None => {
                self.misses += 1;
                return None;
            }
        };
        match fresh {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.entries.pop(key);
                self.misses += 1;
                None
            }
        }
    }

    /// Insert, evicting the least recently used entry at capacity.
    pub fn put(&mut self, key: K, value: V, now: Duration) {
        self.entries.put(key, (value, now));
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn sweep(&mut self, now: Duration) -> usize {
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, (_, inserted))| self.expired(*inserted, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            self.entries.pop(key);
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            capacity: self.entries.cap().get(),
        }
    }
}

/// Size cache key: the fingerprint covers every content input besides the
/// font size and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SizeKey {
    pub id: NodeId,
    pub fingerprint: u64,
    pub font_size: u64,
    pub kind: NodeKind,
}

impl SizeKey {
    pub fn new(id: &str, fingerprint: u64, font_size: f64, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            fingerprint,
            font_size: font_size.to_bits(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundsKey {
    pub id: NodeId,
    pub y: u64,
    pub collapsed: bool,
}

impl BoundsKey {
    pub fn new(id: &str, y: f64, collapsed: bool) -> Self {
        Self {
            id: id.to_string(),
            y: y.to_bits(),
            collapsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CountKey {
    pub id: NodeId,
    pub collapsed: bool,
}

impl CountKey {
    pub fn new(id: &str, collapsed: bool) -> Self {
        Self {
            id: id.to_string(),
            collapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutCacheStats {
    pub sizes: CacheStats,
    pub bounds: CacheStats,
    pub counts: CacheStats,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Look up `key`, computing and storing the value on a miss. The lock is
/// released while `compute` runs.
fn cached<K, V>(cache: &Mutex<TtlLruCache<K, V>>, now: Duration, key: K, compute: impl FnOnce() -> V) -> V
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    if let Some(hit) = lock(cache).get(&key, now) {
        return hit;
    }
    let value = compute();
    lock(cache).put(key, value.clone(), now);
    value
}

/// The engine's three caches and their shared clock.
pub struct LayoutCache {
    sizes: Mutex<TtlLruCache<SizeKey, NodeSize>>,
    bounds: Mutex<TtlLruCache<BoundsKey, Bounds>>,
    counts: Mutex<TtlLruCache<CountKey, usize>>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    last_sweep: Mutex<Duration>,
}

impl std::fmt::Debug for LayoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutCache")
            .field("stats", &self.stats())
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

impl LayoutCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let ttl = Duration::from_millis(config.ttl_ms);
        let now = clock.now();
        Self {
            sizes: Mutex::new(TtlLruCache::new(config.size_capacity, ttl)),
            bounds: Mutex::new(TtlLruCache::new(config.bounds_capacity, ttl)),
            counts: Mutex::new(TtlLruCache::new(config.count_capacity, ttl)),
            clock,
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
            last_sweep: Mutex::new(now),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn size(&self, key: SizeKey, compute: impl FnOnce() -> NodeSize) -> NodeSize {
        cached(&self.sizes, self.clock.now(), key, compute)
    }

    pub fn bounds(&self, key: BoundsKey, compute: impl FnOnce() -> Bounds) -> Bounds {
        cached(&self.bounds, self.clock.now(), key, compute)
    }

    pub fn count(&self, key: CountKey, compute: impl FnOnce() -> usize) -> usize {
        cached(&self.counts, self.clock.now(), key, compute)
    }

    /// Wipe all three caches.
    pub fn clear(&self) {
        lock(&self.sizes).clear();
        lock(&self.bounds).clear();
        lock(&self.counts).clear();
    }

    pub fn clear_bounds(&self) {
        lock(&self.bounds).clear();
    }

    pub fn clear_counts(&self) {
        lock(&self.counts).clear();
    }

    /// Purge expired entries from every cache. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let removed = lock(&self.sizes).sweep(now)
            + lock(&self.bounds).sweep(now)
            + lock(&self.counts).sweep(now);
        *lock(&self.last_sweep) = now;
        tracing::trace!(removed, "swept expired layout cache entries");
        removed
    }

    /// Sweep if the sweep interval has elapsed since the last one.
    pub fn maybe_sweep(&self) -> bool {
        let now = self.clock.now();
        let due = now.saturating_sub(*lock(&self.last_sweep)) >= self.sweep_interval;
        if due {
            self.sweep();
        }
        due
    }

    #[must_use]
    pub fn stats(&self) -> LayoutCacheStats {
        LayoutCacheStats {
            sizes: lock(&self.sizes).stats(),
            bounds: lock(&self.bounds).stats(),
            counts: lock(&self.counts).stats(),
        }
    }
}
