//! Cache engine configuration.
//!
//! Tunables for the memory layer, the remote client, and the invalidation
//! queue. Populated from `strato.toml` / environment via
//! [`crate::config::CacheSettings`].

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MEMORY_MAX_ENTRIES: usize = 500;
const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_STALE_GRACE_SECS: u64 = 0;
const DEFAULT_DEBOUNCE_MS: u64 = 100;
const DEFAULT_TAG_BATCH_SIZE: usize = 10;
const DEFAULT_PATH_BATCH_SIZE: usize = 5;
const DEFAULT_INTER_BATCH_PAUSE_MS: u64 = 25;
const DEFAULT_REMOTE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_REMOTE_RETRY_COOLDOWN_SECS: u64 = 30;

/// Engine tunables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries in the memory layer before LRU eviction.
    pub memory_max_entries: usize,
    /// TTL applied when a caller does not specify one.
    pub default_ttl_secs: u64,
    /// Window after expiry during which one stale read per entry is allowed.
    /// Zero disables stale reads entirely.
    pub stale_grace_secs: u64,
    /// Quiet period before a burst of queued invalidations is processed.
    pub debounce_ms: u64,
    /// Tag invalidations applied concurrently per batch.
    pub tag_batch_size: usize,
    /// Path invalidations applied concurrently per batch.
    pub path_batch_size: usize,
    /// Pause between batches, bounding burst load on the cache layers.
    pub inter_batch_pause_ms: u64,
    /// Fixed per-operation timeout for remote cache calls.
    pub remote_op_timeout_ms: u64,
    /// How long a failed remote stays sidelined before the next use retries.
    pub remote_retry_cooldown_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
            default_ttl_secs: DEFAULT_TTL_SECS,
            stale_grace_secs: DEFAULT_STALE_GRACE_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            tag_batch_size: DEFAULT_TAG_BATCH_SIZE,
            path_batch_size: DEFAULT_PATH_BATCH_SIZE,
            inter_batch_pause_ms: DEFAULT_INTER_BATCH_PAUSE_MS,
            remote_op_timeout_ms: DEFAULT_REMOTE_OP_TIMEOUT_MS,
            remote_retry_cooldown_secs: DEFAULT_REMOTE_RETRY_COOLDOWN_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            memory_max_entries: settings.memory_max_entries,
            default_ttl_secs: settings.default_ttl_secs,
            stale_grace_secs: settings.stale_grace_secs,
            debounce_ms: settings.debounce_ms,
            tag_batch_size: settings.tag_batch_size,
            path_batch_size: settings.path_batch_size,
            inter_batch_pause_ms: settings.inter_batch_pause_ms,
            remote_op_timeout_ms: settings.remote_op_timeout_ms,
            remote_retry_cooldown_secs: settings.remote_retry_cooldown_secs,
        }
    }
}

impl CacheConfig {
    /// Memory capacity as `NonZeroUsize`, clamping zero to 1.
    pub fn memory_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_secs(self.stale_grace_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn inter_batch_pause(&self) -> Duration {
        Duration::from_millis(self.inter_batch_pause_ms)
    }

    pub fn remote_op_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_op_timeout_ms)
    }

    pub fn remote_retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.remote_retry_cooldown_secs)
    }

    /// Tag batch size clamped to at least 1.
    pub fn tag_batch(&self) -> usize {
        self.tag_batch_size.max(1)
    }

    /// Path batch size clamped to at least 1.
    pub fn path_batch(&self) -> usize {
        self.path_batch_size.max(1)
    }
}
