// ── Response cache ──
//
// Envelopes keyed by cache key. Freshness (TTL) decides whether a read
// short-circuits dispatch; eviction is separate and driven by one
// garbage-collection timer per key, re-armed on every write. A timer that
// fires clears its own slot unless a newer write has replaced it.

mod storage;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqflow_api::Envelope;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

pub use storage::{CacheEntry, CacheStorage, MemoryStorage};

struct GcTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct Cache {
    storage: Arc<dyn CacheStorage>,
    gc_timers: Arc<DashMap<String, GcTimer>>,
    generations: Arc<AtomicU64>,
}

impl Cache {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            storage,
            gc_timers: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn read(&self, key: &str) -> Option<CacheEntry> {
        self.storage.get(key)
    }

    /// Store `envelope` and (re)arm the eviction timer. Must be called
    /// from within a Tokio runtime when `gc` is set.
    pub fn write(&self, key: &str, envelope: Envelope, ttl: Duration, gc: Option<Duration>) {
        trace!(cache_key = key, ttl_ms = ttl.as_millis(), "cache write");
        self.storage.set(key.to_owned(), CacheEntry::new(envelope, ttl));
        self.schedule_gc(key, gc);
    }

    pub fn is_fresh(entry: &CacheEntry) -> bool {
        entry.is_fresh()
    }

    /// Remove an entry and its timer. Returns whether anything was cached.
    pub fn invalidate(&self, key: &str) -> bool {
        if let Some((_, timer)) = self.gc_timers.remove(key) {
            timer.handle.abort();
        }
        self.storage.delete(key).is_some()
    }

    pub fn clear(&self) {
        for entry in self.gc_timers.iter() {
            entry.value().handle.abort();
        }
        self.gc_timers.clear();
        self.storage.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.storage.keys()
    }

    fn schedule_gc(&self, key: &str, gc: Option<Duration>) {
        let Some(delay) = gc else {
            if let Some((_, previous)) = self.gc_timers.remove(key) {
                previous.handle.abort();
            }
            return;
        };

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let storage = Arc::clone(&self.storage);
        let timers = Arc::clone(&self.gc_timers);
        let owned_key = key.to_owned();

        // The slot stays locked until the new timer is in it, so a timer
        // that fires early cannot miss its own entry.
        let slot = self.gc_timers.entry(key.to_owned());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timers.remove_if(&owned_key, |_, timer| timer.generation == generation);
            if storage.delete(&owned_key).is_some() {
                debug!(cache_key = %owned_key, "cache entry garbage collected");
            }
        });
        let timer = GcTimer { generation, handle };
        match slot {
            Entry::Occupied(mut occupied) => occupied.insert(timer).handle.abort(),
            Entry::Vacant(vacant) => {
                vacant.insert(timer);
            }
        }
    }

    #[cfg(test)]
    fn timer_count(&self) -> usize {
        self.gc_timers.len()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("timers", &self.gc_timers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(n: i64) -> Envelope {
        Envelope::success(json!(n), 200)
    }

    #[tokio::test(start_paused = true)]
    async fn entry_goes_stale_after_ttl() {
        let cache = Cache::in_memory();
        cache.write("k", ok(1), Duration::from_millis(100), None);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(cache.read("k").unwrap().is_fresh());

        tokio::time::advance(Duration::from_millis(1)).await;
        let entry = cache.read("k").unwrap();
        assert!(!Cache::is_fresh(&entry));
        assert_eq!(entry.envelope, ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn gc_evicts_independently_of_ttl() {
        let cache = Cache::in_memory();
        cache.write("k", ok(1), Duration::from_secs(3600), Some(Duration::from_millis(50)));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.read("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rewrite_rearms_gc_timer() {
        let cache = Cache::in_memory();
        cache.write("k", ok(1), Duration::from_secs(1), Some(Duration::from_millis(50)));
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.write("k", ok(2), Duration::from_secs(1), Some(Duration::from_millis(50)));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.read("k").unwrap().envelope, ok(2));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.read("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn fired_timers_release_their_slots() {
        let cache = Cache::in_memory();
        for n in 0..5 {
            let gc = Some(Duration::from_millis(10));
            cache.write(&format!("k{n}"), ok(n), Duration::from_secs(1), gc);
        }
        assert_eq!(cache.timer_count(), 5);

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert!(cache.keys().is_empty());
        assert_eq!(cache.timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_timer_leaves_the_newer_one_alone() {
        let cache = Cache::in_memory();
        cache.write("k", ok(1), Duration::from_secs(1), Some(Duration::from_millis(50)));
        cache.write("k", ok(2), Duration::from_secs(1), Some(Duration::from_millis(200)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(cache.timer_count(), 1);
        assert_eq!(cache.read("k").unwrap().envelope, ok(2));

        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.timer_count(), 0);
        assert!(cache.read("k").is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = Cache::in_memory();
        cache.write("k", ok(1), Duration::from_secs(1), Some(Duration::from_secs(60)));
        assert!(cache.invalidate("k"));
        assert!(!cache.invalidate("k"));
        assert!(cache.keys().is_empty());
    }
}
