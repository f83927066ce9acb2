//! Memory cache layer.
//!
//! Bounded LRU store holding serialized values with per-entry TTL. Expiry is
//! lazy: an expired entry is dropped on the read that discovers it. When a
//! stale grace window is configured, the first read after expiry is still
//! served (once per entry) so a popular key does not stampede its compute
//! path the instant it expires.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use super::config::CacheConfig;
use super::lock::{read_guard, write_guard};

const SOURCE: &str = "cache::memory";

struct Entry {
    value: Bytes,
    inserted_at: Instant,
    ttl: Duration,
    stale_served: bool,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }

    fn within_grace(&self, grace: Duration) -> bool {
        self.inserted_at.elapsed() < self.ttl + grace
    }
}

/// Bounded in-process cache, consulted first on every read.
///
/// Not shared across processes; each instance owns its state outright.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
    max_entries: usize,
    stale_grace: Duration,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity())),
            max_entries: config.memory_capacity().get(),
            stale_grace: config.stale_grace(),
        }
    }

    /// Look up a key, treating TTL-expired entries as absent.
    ///
    /// A hit refreshes the key's LRU position. With a nonzero stale grace,
    /// the first read after expiry returns the stale value and marks the
    /// entry so the next reader falls through to recompute.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = write_guard(&self.entries, SOURCE, "get");

        if let Some(entry) = entries.get_mut(key) {
            if entry.is_fresh() {
                return Some(entry.value.clone());
            }
            if !self.stale_grace.is_zero()
                && !entry.stale_served
                && entry.within_grace(self.stale_grace)
            {
                entry.stale_served = true;
                debug!(key, source = SOURCE, "serving stale entry within grace window");
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        entries.pop(key);
        None
    }

    /// Insert or overwrite an entry.
    ///
    /// Returns the key evicted to make room, if the store was at capacity,
    /// so the caller can drop its tag registrations.
    pub fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Option<String> {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
            ttl,
            stale_served: false,
        };

        write_guard(&self.entries, SOURCE, "set")
            .push(key.to_string(), entry)
            .and_then(|(evicted, _)| (evicted != key).then_some(evicted))
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> bool {
        write_guard(&self.entries, SOURCE, "remove")
            .pop(key)
            .is_some()
    }

    /// Remove every key matching the predicate; returns the removed keys.
    pub fn remove_matching(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let mut entries = write_guard(&self.entries, SOURCE, "remove_matching");
        let matched: Vec<String> = entries
            .iter()
            .map(|(key, _)| key.clone())
            .filter(|key| predicate(key))
            .collect();
        for key in &matched {
            entries.pop(key);
        }
        matched
    }

    /// Drop every expired entry (including any past its grace window);
    /// returns how many were removed. Called from the maintenance sweep so
    /// cold keys do not pin memory until their next read.
    pub fn purge_expired(&self) -> usize {
        let mut entries = write_guard(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        write_guard(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        read_guard(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;

    fn store_with(max_entries: usize, stale_grace_secs: u64) -> MemoryStore {
        MemoryStore::new(&CacheConfig {
            memory_max_entries: max_entries,
            stale_grace_secs,
            ..Default::default()
        })
    }

    fn value(text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }

    #[test]
    fn set_get_remove_roundtrip() {
        let store = store_with(10, 0);

        assert!(store.get("a").is_none());
        assert!(store.set("a", value("1"), Duration::from_secs(60)).is_none());
        assert_eq!(store.get("a"), Some(value("1")));

        assert!(store.remove("a"));
        assert!(store.get("a").is_none());
        assert!(!store.remove("a"));
    }

    #[test]
    fn overwrite_replaces_value_without_eviction() {
        let store = store_with(10, 0);

        store.set("a", value("1"), Duration::from_secs(60));
        let evicted = store.set("a", value("2"), Duration::from_secs(60));

        assert!(evicted.is_none());
        assert_eq!(store.get("a"), Some(value("2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lru_eviction_prefers_least_recently_used() {
        let store = store_with(2, 0);

        store.set("a", value("1"), Duration::from_secs(60));
        store.set("b", value("2"), Duration::from_secs(60));

        // Touch "a" so "b" becomes the LRU entry.
        assert!(store.get("a").is_some());

        let evicted = store.set("c", value("3"), Duration::from_secs(60));
        assert_eq!(evicted.as_deref(), Some("b"));

        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let store = store_with(10, 0);

        store.set("a", value("1"), Duration::from_millis(20));
        assert!(store.get("a").is_some());

        sleep(Duration::from_millis(40));
        assert!(store.get("a").is_none());
        // Lazy expiry also removed it.
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn stale_grace_allows_exactly_one_read() {
        let store = store_with(10, 60);

        store.set("a", value("1"), Duration::from_millis(20));
        sleep(Duration::from_millis(40));

        // First post-expiry read is served stale, the second falls through.
        assert_eq!(store.get("a"), Some(value("1")));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn remove_matching_returns_removed_keys() {
        let store = store_with(10, 0);

        store.set("events:1:detail", value("1"), Duration::from_secs(60));
        store.set("events:2:detail", value("2"), Duration::from_secs(60));
        store.set("orders:1", value("3"), Duration::from_secs(60));

        let mut removed = store.remove_matching(|key| key.starts_with("events:"));
        removed.sort();

        assert_eq!(removed, vec!["events:1:detail", "events:2:detail"]);
        assert_eq!(store.len(), 1);
        assert!(store.get("orders:1").is_some());
    }

    #[test]
    fn purge_expired_sweeps_only_dead_entries() {
        let store = store_with(10, 0);

        store.set("short", value("1"), Duration::from_millis(20));
        store.set("long", value("2"), Duration::from_secs(60));

        sleep(Duration::from_millis(40));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("long").is_some());
    }
}
