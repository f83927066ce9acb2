//! The cache service object.
//!
//! One explicitly constructed handle bundling the layered cache and its
//! invalidation queue. Built at application startup and passed by reference
//! to every collaborator; there is no global instance. Construction spawns
//! the queue worker, so it must happen inside a tokio runtime.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::config::CacheConfig;
use super::layered::{GetOptions, LayeredCache};
use super::queue::{InvalidationQueue, InvalidationSink, QueueDepth};
use super::remote::RemoteCache;
use super::stats::StatsSnapshot;

/// Layered cache plus invalidation queue under one handle.
pub struct CacheService {
    cache: Arc<LayeredCache>,
    queue: Arc<InvalidationQueue>,
}

impl CacheService {
    pub fn new(config: CacheConfig, remote: RemoteCache) -> Self {
        let cache = Arc::new(LayeredCache::new(&config, remote));
        let sink: Arc<dyn InvalidationSink> = Arc::clone(&cache) as Arc<dyn InvalidationSink>;
        let queue = Arc::new(InvalidationQueue::start(sink, &config));
        Self { cache, queue }
    }

    /// Read-through fetch; see [`LayeredCache::get_or_compute`].
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
        self.cache.get_or_compute(key, options, compute).await
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, options: &GetOptions) {
        self.cache.set(key, value, options).await;
    }

    pub async fn invalidate_key(&self, key: &str) {
        self.cache.invalidate_key(key).await;
    }

    pub async fn invalidate_by_tag(&self, tag: &str) {
        self.cache.invalidate_by_tag(tag).await;
    }

    pub async fn invalidate_pattern(&self, glob: &str) {
        self.cache.invalidate_pattern(glob).await;
    }

    pub async fn flush_all(&self) {
        self.cache.flush_all().await;
    }

    /// Fire-and-forget: tags are applied by the debounce worker shortly
    /// after the burst quiets down.
    pub fn enqueue_tag_invalidation<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.enqueue_tags(tags);
    }

    /// Fire-and-forget: paths (logical key prefixes) applied like tags.
    pub fn enqueue_path_invalidation<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queue.enqueue_paths(paths);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.cache.stats()
    }

    pub fn queue_depth(&self) -> QueueDepth {
        self.queue.depth()
    }

    /// Apply all pending invalidations now; used by shutdown and tests.
    pub async fn flush_queue(&self) {
        self.queue.flush().await;
    }

    /// Drop expired memory entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.cache.memory().purge_expired()
    }

    /// Live remote connectivity probe.
    pub async fn remote_ping(&self) -> bool {
        self.cache.remote().ping().await
    }

    /// Drain the queue, then stop its worker.
    pub async fn shutdown(&self) {
        self.queue.flush().await;
        self.queue.shutdown();
    }

    pub fn layered(&self) -> &Arc<LayeredCache> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<InvalidationQueue> {
        &self.queue
    }
}
