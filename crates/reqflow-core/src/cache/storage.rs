use std::time::Duration;

use dashmap::DashMap;
use reqflow_api::Envelope;
use tokio::time::Instant;

/// A cached envelope with its freshness window.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub envelope: Envelope,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(envelope: Envelope, ttl: Duration) -> Self {
        Self {
            envelope,
            timestamp: Instant::now(),
            ttl,
        }
    }

    /// Fresh while `now - timestamp <= ttl`.
    pub fn is_fresh(&self) -> bool {
        self.timestamp.elapsed() <= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Key-value backing store for the cache.
pub trait CacheStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: String, entry: CacheEntry);
    fn delete(&self, key: &str) -> Option<CacheEntry>;
    fn keys(&self) -> Vec<String>;
    fn clear(&self);
}

/// Lock-free in-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    fn delete(&self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
