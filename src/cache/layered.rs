//! Multi-layer read-through orchestration.
//!
//! Composes the memory layer, the remote layer, and the tag index behind
//! one API: check memory, check remote, compute, populate both layers,
//! register tags. Remote failures degrade silently to memory-only
//! operation; compute failures belong to the caller and pass through
//! unmodified.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::error::CacheError;
use super::memory::MemoryStore;
use super::pattern;
use super::queue::InvalidationSink;
use super::remote::RemoteCache;
use super::stats::{CacheStats, StatsSnapshot};
use super::tags::TagIndex;

const SOURCE: &str = "cache::layered";

/// Per-call options for reads and writes.
#[derive(Debug, Clone)]
pub struct GetOptions {
    /// TTL for the entry; the configured default when unset.
    pub ttl: Option<Duration>,
    /// Whether the remote layer participates in this call.
    pub use_remote: bool,
    /// Tags to register the key under after a successful populate.
    pub tags: Vec<String>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            use_remote: true,
            tags: Vec::new(),
        }
    }
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn memory_only(mut self) -> Self {
        self.use_remote = false;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// The read-through cache: memory in front of remote in front of compute.
pub struct LayeredCache {
    memory: MemoryStore,
    remote: RemoteCache,
    tags: TagIndex,
    stats: CacheStats,
    default_ttl: Duration,
}

impl LayeredCache {
    pub fn new(config: &CacheConfig, remote: RemoteCache) -> Self {
        Self {
            memory: MemoryStore::new(config),
            remote,
            tags: TagIndex::new(),
            stats: CacheStats::new(),
            default_ttl: config.default_ttl(),
        }
    }

    /// Fetch `key`, computing it on a full miss.
    ///
    /// Lookup order is memory, then remote (when enabled and available),
    /// then `compute`. A remote hit back-fills the memory layer; a compute
    /// populates both. Concurrent misses for the same key each run their
    /// own compute — there is no single-flight coalescing.
    ///
    /// Compute errors propagate to the caller unchanged; nothing is cached
    /// on a failed compute.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        options: GetOptions,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(raw) = self.memory.get(key) {
            match serde_json::from_slice(&raw) {
                Ok(value) => {
                    self.stats.record_memory_hit();
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        source = SOURCE,
                        key,
                        error = %err,
                        "dropping undecodable memory entry"
                    );
                    self.memory.remove(key);
                }
            }
        }
        self.stats.record_memory_miss();

        let ttl = options.ttl.unwrap_or(self.default_ttl);

        if options.use_remote && self.remote.is_available() {
            if let Some(raw) = self.remote.get_raw(key).await {
                match serde_json::from_slice(&raw) {
                    Ok(value) => {
                        self.stats.record_remote_hit();
                        self.store_in_memory(key, raw, ttl);
                        self.tags.register(key, &options.tags);
                        return Ok(value);
                    }
                    Err(err) => {
                        warn!(
                            source = SOURCE,
                            key,
                            error = %err,
                            "undecodable remote payload treated as miss"
                        );
                        self.stats.record_remote_miss();
                    }
                }
            } else {
                self.stats.record_remote_miss();
            }
        }

        self.stats.record_compute();
        let value = compute().await?;

        match serde_json::to_vec(&value) {
            Ok(buf) => {
                let raw = Bytes::from(buf);
                self.store_in_memory(key, raw.clone(), ttl);
                if options.use_remote {
                    self.remote.set_raw(key, &raw, ttl).await;
                }
                self.tags.register(key, &options.tags);
            }
            Err(err) => {
                // The caller still gets their value; it just is not cached.
                warn!(source = SOURCE, key, error = %err, "computed value not cached");
            }
        }

        Ok(value)
    }

    /// Write a value into both layers and register its tags.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: &GetOptions) {
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        match serde_json::to_vec(value) {
            Ok(buf) => {
                let raw = Bytes::from(buf);
                self.store_in_memory(key, raw.clone(), ttl);
                if options.use_remote {
                    self.remote.set_raw(key, &raw, ttl).await;
                }
                self.tags.register(key, &options.tags);
            }
            Err(err) => {
                warn!(source = SOURCE, key, error = %err, "value not cached");
            }
        }
    }

    /// Remove one key from both layers and the tag index. Removing an
    /// absent key is a no-op.
    pub async fn invalidate_key(&self, key: &str) {
        self.memory.remove(key);
        self.remote.delete(key).await;
        self.tags.remove_key(key);
        debug!(source = SOURCE, key, "key invalidated");
    }

    /// Remove every key registered under `tag` from both layers, then drop
    /// the tag entry. Memory removals come first; remote deletes run
    /// concurrently; the tag entry is cleared only after both layers are
    /// done. Invalidating an unknown tag is a no-op.
    pub async fn invalidate_by_tag(&self, tag: &str) {
        let keys = self.tags.keys_for_tag(tag);
        if keys.is_empty() {
            self.tags.remove_tag(tag);
            return;
        }

        for key in &keys {
            self.memory.remove(key);
        }

        futures::future::join_all(keys.iter().map(|key| self.remote.delete(key))).await;

        for key in &keys {
            self.tags.remove_key(key);
        }
        self.tags.remove_tag(tag);

        debug!(source = SOURCE, tag, keys = keys.len(), "tag invalidated");
    }

    /// Remove every key matching a glob pattern from both layers, pruning
    /// the tag index to match. The memory side is a full key-space scan.
    pub async fn invalidate_pattern(&self, glob: &str) {
        let removed = self.memory.remove_matching(|key| pattern::matches(glob, key));
        for key in &removed {
            self.tags.remove_key(key);
        }
        // Keys this process never held in memory may still be indexed
        // (remote hits in a previous life) — prune those too.
        self.tags
            .remove_keys_matching(|key| pattern::matches(glob, key));

        self.remote.delete_pattern(glob).await;

        debug!(
            source = SOURCE,
            glob,
            memory_removed = removed.len(),
            "pattern invalidated"
        );
    }

    /// Drop everything: memory entries, remote keys, tag index.
    pub async fn flush_all(&self) {
        self.memory.clear();
        self.tags.clear();
        self.remote.delete_pattern("*").await;
        debug!(source = SOURCE, "cache flushed");
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::collect(
            &self.stats,
            self.memory.len(),
            self.memory.max_entries(),
            self.remote.is_available(),
        )
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn remote(&self) -> &RemoteCache {
        &self.remote
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.tags
    }

    fn store_in_memory(&self, key: &str, raw: Bytes, ttl: Duration) {
        if let Some(evicted) = self.memory.set(key, raw, ttl) {
            self.stats.record_eviction();
            self.tags.remove_key(&evicted);
        }
    }
}

#[async_trait]
impl InvalidationSink for LayeredCache {
    async fn apply_tag(&self, tag: &str) -> Result<(), CacheError> {
        self.invalidate_by_tag(tag).await;
        Ok(())
    }

    /// A path is a logical key prefix; flushing it means removing every
    /// key under it from both layers.
    async fn apply_path(&self, path: &str) -> Result<(), CacheError> {
        self.invalidate_pattern(&format!("{path}*")).await;
        Ok(())
    }
}
