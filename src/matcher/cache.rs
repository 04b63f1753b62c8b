//! Match outcome caching for metric names.
//!
//! Running the full regex for every sample is the dominant cost of an
//! aggregator, while the set of distinct metric names is small and stable.
//! [`MatchCache`] remembers the outcome (including negative outcomes) per raw
//! name and forgets names that have not been seen for a while.
//!
//! # Thread Safety
//! The cache is shared between producer threads (drop-raw decisions made
//! before queueing) and the worker loop. A single mutex guards it; it is held
//! for one lookup, one insert or one eviction pass, and never while the regex
//! runs.
//!
//! # Eviction
//! Entries carry the epoch second they were last seen. A min-heap keyed by
//! that second acts as a recency index. Refreshing an entry only updates the
//! map; the heap entry is corrected lazily when it reaches the top during an
//! eviction pass, so every name has exactly one heap entry and eviction costs
//! O(log n) per examined entry regardless of map iteration order.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

/// Output key shared between the cache and the bucket store.
pub type OutputKey = Arc<str>;

/// Cached outcome of matching one raw metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Output key if the name matched the pattern
    pub key: Option<OutputKey>,
    /// Epoch second of the last lookup
    pub seen: u64,
}

impl CacheEntry {
    pub fn matched(&self) -> bool {
        self.key.is_some()
    }
}

/// Cache performance statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that ran the full match
    pub misses: u64,
    /// Entries removed by eviction passes
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct CacheStorage {
    entries: HashMap<Arc<[u8]>, CacheEntry>,
    recency: BinaryHeap<Reverse<(u64, Arc<[u8]>)>>,
    stats: CacheStats,
}

/// Concurrent raw-name → match-outcome cache with age-based eviction.
#[derive(Debug)]
pub struct MatchCache {
    storage: Mutex<CacheStorage>,
    clock: Arc<dyn Clock>,
}

impl MatchCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: Mutex::new(CacheStorage::default()),
            clock,
        }
    }

    /// Look up `name`, running `matcher` on a miss.
    ///
    /// A hit refreshes the entry's last-seen time. A miss stores whatever
    /// `matcher` returned, so repeated non-matching names are cheap too.
    pub fn get_or_match<F>(&self, name: &[u8], matcher: F) -> Option<OutputKey>
    where
        F: FnOnce(&[u8]) -> Option<String>,
    {
        let now = self.clock.now();
        {
            let mut storage = self.storage.lock();
            if let Some(entry) = storage.entries.get_mut(name) {
                entry.seen = now;
                let key = entry.key.clone();
                storage.stats.hits += 1;
                return key;
            }
            storage.stats.misses += 1;
        }

        let key: Option<OutputKey> = matcher(name).map(Into::into);

        let mut storage = self.storage.lock();
        if let Some(entry) = storage.entries.get_mut(name) {
            // another caller matched the same name while the lock was released
            entry.seen = entry.seen.max(now);
            return entry.key.clone();
        }
        let name: Arc<[u8]> = Arc::from(name);
        storage.recency.push(Reverse((now, name.clone())));
        storage.entries.insert(
            name,
            CacheEntry {
                key: key.clone(),
                seen: now,
            },
        );
        key
    }

    /// Remove every entry last seen before `now - max_age`.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_older_than(&self, now: u64, max_age: u64) -> usize {
        let cutoff = now.saturating_sub(max_age);
        let mut storage = self.storage.lock();
        let mut evicted = 0;

        while let Some(Reverse((seen, _))) = storage.recency.peek() {
            if *seen >= cutoff {
                break;
            }
            let Some(Reverse((_, name))) = storage.recency.pop() else {
                break;
            };
            let last_seen = storage.entries.get(&name).map(|entry| entry.seen);
            match last_seen {
                Some(seen) if seen < cutoff => {
                    storage.entries.remove(&name);
                    evicted += 1;
                }
                Some(seen) => storage.recency.push(Reverse((seen, name))),
                None => {}
            }
        }

        storage.stats.evictions += evicted as u64;
        evicted
    }

    pub fn get(&self, name: &[u8]) -> Option<CacheEntry> {
        self.storage.lock().entries.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.storage.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_at(now: u64) -> (MatchCache, ManualClock) {
        let clock = ManualClock::new(now);
        (MatchCache::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_hit_skips_matcher_and_refreshes() {
        let (cache, clock) = cache_at(1000);
        let calls = AtomicUsize::new(0);
        let matcher = |_: &[u8]| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some("out.key".to_string())
        };

        let first = cache.get_or_match(b"in.key", matcher);
        clock.advance(30);
        let second = cache.get_or_match(b"in.key", matcher);

        assert_eq!(first.as_deref(), Some("out.key"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(b"in.key").unwrap().seen, 1030);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_negative_outcomes_are_cached() {
        let (cache, _) = cache_at(1000);
        let calls = AtomicUsize::new(0);
        let matcher = |_: &[u8]| {
            calls.fetch_add(1, Ordering::SeqCst);
            None
        };

        assert_eq!(cache.get_or_match(b"nope", matcher), None);
        assert_eq!(cache.get_or_match(b"nope", matcher), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.get(b"nope").unwrap().matched());
    }

    #[test]
    fn test_evicts_only_stale_entries() {
        let (cache, clock) = cache_at(1000);
        cache.get_or_match(b"old", |_| Some("a".to_string()));
        clock.set(1500);
        cache.get_or_match(b"fresh", |_| Some("b".to_string()));

        // cutoff = 2000 - 600 = 1400
        let evicted = cache.evict_older_than(2000, 600);

        assert_eq!(evicted, 1);
        assert!(cache.get(b"old").is_none());
        assert!(cache.get(b"fresh").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_refreshed_entry_survives_eviction() {
        let (cache, clock) = cache_at(1000);
        cache.get_or_match(b"busy", |_| Some("a".to_string()));
        cache.get_or_match(b"idle", |_| None);

        // refresh only "busy"; its heap entry still says 1000
        clock.set(1900);
        cache.get_or_match(b"busy", |_| unreachable!());

        assert_eq!(cache.evict_older_than(2000, 500), 1);
        assert!(cache.get(b"busy").is_some());
        assert!(cache.get(b"idle").is_none());

        // the re-indexed entry is evicted once it really is stale
        assert_eq!(cache.evict_older_than(2500, 500), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_with_nothing_stale() {
        let (cache, _) = cache_at(1000);
        cache.get_or_match(b"a", |_| None);
        assert_eq!(cache.evict_older_than(1000, 100), 0);
        assert_eq!(cache.evict_older_than(50, 100), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let (cache, _) = cache_at(1000);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .map(|i| {
                            let name = format!("metric.{}", i % 50);
                            cache.get_or_match(name.as_bytes(), |n| {
                                Some(format!("out.{}", String::from_utf8_lossy(n)))
                            })
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for (i, key) in handle.join().unwrap().into_iter().enumerate() {
                assert_eq!(key.as_deref(), Some(format!("out.metric.{}", i % 50).as_str()));
            }
        }
        assert_eq!(cache.len(), 50);
    }
}
