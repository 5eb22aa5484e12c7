//! Time-bounded in-memory cache with an injectable clock.

use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Time source for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Used in tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Key/value cache whose entries expire `ttl` after insertion.
///
/// At most `max_entries` are held; inserting into a full cache first drops expired
/// entries and then evicts the least recently used one.
pub struct TtlCache<K: Hash + Eq, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<K, Entry<V>>> {
        // A poisoned map is still structurally valid; keep serving it.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_fresh(&self, now: Instant, entry: &Entry<V>) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries();
        let value = entries
            .get(key)
            .map(|entry| self.is_fresh(now, entry).then(|| entry.value.clone()));
        match value {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries();
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            self.purge_locked(&mut entries, now);
        }
        entries.put(
            key,
            Entry {
                value,
                stored_at: now,
            },
        );
    }

    fn purge_locked(&self, entries: &mut LruCache<K, Entry<V>>, now: Instant) {
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| !self.is_fresh(now, entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
