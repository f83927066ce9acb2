//! Per-layer cache statistics.
//!
//! Counters are process-lifetime monotonic and reset only on restart. Each
//! increment is mirrored to the `metrics` recorder so operators see the same
//! numbers in their exporter as in `GET /stats`.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;

const METRIC_MEMORY_HIT_TOTAL: &str = "strato_cache_memory_hit_total";
const METRIC_MEMORY_MISS_TOTAL: &str = "strato_cache_memory_miss_total";
const METRIC_REMOTE_HIT_TOTAL: &str = "strato_cache_remote_hit_total";
const METRIC_REMOTE_MISS_TOTAL: &str = "strato_cache_remote_miss_total";
const METRIC_COMPUTE_TOTAL: &str = "strato_cache_compute_total";
const METRIC_EVICT_TOTAL: &str = "strato_cache_evict_total";

/// Layer hit/miss counters for one cache service instance.
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    remote_hits: AtomicU64,
    remote_misses: AtomicU64,
    compute_count: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_MEMORY_HIT_TOTAL).increment(1);
    }

    pub fn record_memory_miss(&self) {
        self.memory_misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_MEMORY_MISS_TOTAL).increment(1);
    }

    pub fn record_remote_hit(&self) {
        self.remote_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_REMOTE_HIT_TOTAL).increment(1);
    }

    pub fn record_remote_miss(&self) {
        self.remote_misses.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_REMOTE_MISS_TOTAL).increment(1);
    }

    pub fn record_compute(&self) {
        self.compute_count.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_COMPUTE_TOTAL).increment(1);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_EVICT_TOTAL).increment(1);
    }

    pub fn memory_hits(&self) -> u64 {
        self.memory_hits.load(Ordering::Relaxed)
    }

    pub fn memory_misses(&self) -> u64 {
        self.memory_misses.load(Ordering::Relaxed)
    }

    pub fn remote_hits(&self) -> u64 {
        self.remote_hits.load(Ordering::Relaxed)
    }

    pub fn remote_misses(&self) -> u64 {
        self.remote_misses.load(Ordering::Relaxed)
    }

    pub fn compute_count(&self) -> u64 {
        self.compute_count.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the counters plus memory-layer occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub remote_hits: u64,
    pub remote_misses: u64,
    pub compute_count: u64,
    pub memory_size: usize,
    pub memory_max_size: usize,
    /// Served-from-cache share of all lookups: `(memory_hits + remote_hits)
    /// / (memory_hits + memory_misses)`. Zero before the first lookup.
    pub hit_rate: f64,
    pub remote_available: bool,
}

impl StatsSnapshot {
    pub(crate) fn collect(
        stats: &CacheStats,
        memory_size: usize,
        memory_max_size: usize,
        remote_available: bool,
    ) -> Self {
        let memory_hits = stats.memory_hits();
        let memory_misses = stats.memory_misses();
        let remote_hits = stats.remote_hits();
        let lookups = memory_hits + memory_misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            (memory_hits + remote_hits) as f64 / lookups as f64
        };

        Self {
            memory_hits,
            memory_misses,
            remote_hits,
            remote_misses: stats.remote_misses(),
            compute_count: stats.compute_count(),
            memory_size,
            memory_max_size,
            hit_rate,
            remote_available,
        }
    }
}
