//! Remote cache layer (Redis).
//!
//! Pure acceleration, never a correctness dependency: every operation error
//! — pool exhaustion, command failure, timeout, undecodable payload — is
//! logged and reported as a miss or a failed write. Nothing here propagates
//! to callers.
//!
//! Connections are pooled and established lazily on first use. After a
//! failure the client sidelines itself and retries on the next use once a
//! cooldown has passed; there is no background reconnect loop.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use bytes::Bytes;
use deadpool_redis::{Pool, Runtime};
use redis::{AsyncCommands, AsyncIter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::lock::{read_guard, write_guard};

const SOURCE: &str = "cache::remote";

/// Keys deleted per DEL command while draining a SCAN.
const PATTERN_DELETE_CHUNK: usize = 50;

/// Redis-backed second cache layer with availability tracking.
pub struct RemoteCache {
    pool: Option<Pool>,
    op_timeout: Duration,
    retry_cooldown: Duration,
    down_since: RwLock<Option<Instant>>,
}

impl RemoteCache {
    /// A permanently-disabled remote layer: `is_available` is false and all
    /// operations no-op. Used when no URL is configured.
    pub fn disabled() -> Self {
        Self {
            pool: None,
            op_timeout: Duration::ZERO,
            retry_cooldown: Duration::ZERO,
            down_since: RwLock::new(None),
        }
    }

    /// Build a client over a connection pool for `url`.
    ///
    /// Pool creation validates the URL but opens no connection; the first
    /// operation connects. A malformed URL yields a disabled client rather
    /// than an error.
    pub fn connect(url: &str, config: &CacheConfig) -> Self {
        match deadpool_redis::Config::from_url(url).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => {
                info!(source = SOURCE, "remote cache layer configured");
                Self {
                    pool: Some(pool),
                    op_timeout: config.remote_op_timeout(),
                    retry_cooldown: config.remote_retry_cooldown(),
                    down_since: RwLock::new(None),
                }
            }
            Err(err) => {
                warn!(
                    source = SOURCE,
                    error = %err,
                    "remote cache disabled: connection pool could not be created"
                );
                Self::disabled()
            }
        }
    }

    /// Whether the remote layer is worth consulting right now.
    ///
    /// False when unconfigured, or while sidelined after a failure. Once
    /// the retry cooldown elapses this reports true again so the next use
    /// re-attempts the connection.
    pub fn is_available(&self) -> bool {
        if self.pool.is_none() {
            return false;
        }
        match *read_guard(&self.down_since, SOURCE, "is_available") {
            None => true,
            Some(since) => since.elapsed() >= self.retry_cooldown,
        }
    }

    /// Whether a remote layer is configured at all.
    pub fn is_configured(&self) -> bool {
        self.pool.is_some()
    }

    /// Fetch the raw serialized payload for a key.
    pub async fn get_raw(&self, key: &str) -> Option<Bytes> {
        let pool = self.pool.as_ref()?;
        if !self.is_available() {
            return None;
        }

        let op = async {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.get::<_, Option<Vec<u8>>>(key)
                .await
                .map_err(|err| err.to_string())
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(found)) => {
                self.mark_up();
                found.map(Bytes::from)
            }
            Ok(Err(message)) => {
                self.fault("get", key, &message);
                None
            }
            Err(_) => {
                self.fault("get", key, "operation timed out");
                None
            }
        }
    }

    /// Fetch and deserialize a value. An undecodable payload is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    source = SOURCE,
                    key,
                    error = %err,
                    "undecodable remote payload treated as miss"
                );
                None
            }
        }
    }

    /// Store a raw serialized payload under `key` with the given TTL.
    pub async fn set_raw(&self, key: &str, value: &Bytes, ttl: Duration) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };
        if !self.is_available() {
            return false;
        }

        let ttl_secs = ttl.as_secs().max(1);
        let op = async {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.set_ex::<_, _, ()>(key, value.as_ref(), ttl_secs)
                .await
                .map_err(|err| err.to_string())
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(())) => {
                self.mark_up();
                true
            }
            Ok(Err(message)) => {
                self.fault("set", key, &message);
                false
            }
            Err(_) => {
                self.fault("set", key, "operation timed out");
                false
            }
        }
    }

    /// Serialize and store a value under `key` with the given TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match serde_json::to_vec(value) {
            Ok(buf) => self.set_raw(key, &Bytes::from(buf), ttl).await,
            Err(err) => {
                warn!(source = SOURCE, key, error = %err, "value not written to remote");
                false
            }
        }
    }

    /// Delete a key. Deleting an absent key still reports success.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };
        if !self.is_available() {
            return false;
        }

        let op = async {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            conn.del::<_, usize>(key).await.map_err(|err| err.to_string())
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(_)) => {
                self.mark_up();
                true
            }
            Ok(Err(message)) => {
                self.fault("delete", key, &message);
                false
            }
            Err(_) => {
                self.fault("delete", key, "operation timed out");
                false
            }
        }
    }

    /// Delete every key matching a glob pattern, via cursor-based SCAN
    /// (never KEYS) and chunked DELs.
    pub async fn delete_pattern(&self, pattern: &str) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };
        if !self.is_available() {
            return false;
        }

        let op = async {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;

            let mut keys: Vec<String> = Vec::new();
            {
                let mut iter: AsyncIter<'_, String> = conn
                    .scan_match(pattern)
                    .await
                    .map_err(|err| err.to_string())?;
                while let Some(key) = iter.next_item().await {
                    keys.push(key);
                }
            }

            let mut deleted = 0usize;
            for chunk in keys.chunks(PATTERN_DELETE_CHUNK) {
                deleted += conn
                    .del::<_, usize>(chunk)
                    .await
                    .map_err(|err| err.to_string())?;
            }
            Ok::<usize, String>(deleted)
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(deleted)) => {
                self.mark_up();
                debug!(source = SOURCE, pattern, deleted, "pattern delete complete");
                true
            }
            Ok(Err(message)) => {
                self.fault("delete_pattern", pattern, &message);
                false
            }
            Err(_) => {
                self.fault("delete_pattern", pattern, "operation timed out");
                false
            }
        }
    }

    /// Live connectivity probe; flips availability either way.
    pub async fn ping(&self) -> bool {
        let Some(pool) = self.pool.as_ref() else {
            return false;
        };

        let op = async {
            let mut conn = pool.get().await.map_err(|err| err.to_string())?;
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(|err| err.to_string())
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(_)) => {
                self.mark_up();
                true
            }
            Ok(Err(message)) => {
                self.fault("ping", "-", &message);
                false
            }
            Err(_) => {
                self.fault("ping", "-", "operation timed out");
                false
            }
        }
    }

    fn mark_up(&self) {
        let mut down = write_guard(&self.down_since, SOURCE, "mark_up");
        if down.take().is_some() {
            info!(source = SOURCE, "remote cache recovered");
        }
    }

    fn fault(&self, op: &'static str, key: &str, message: &str) {
        warn!(
            source = SOURCE,
            op,
            key,
            error = message,
            "remote cache operation failed; degrading to memory-only"
        );
        let mut down = write_guard(&self.down_since, SOURCE, "fault");
        *down = Some(Instant::now());
    }
}
