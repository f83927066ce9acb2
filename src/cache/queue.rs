//! Debounced, batched invalidation dispatch.
//!
//! A single logical mutation often fans out into many related
//! invalidations (entity detail, entity list, per-scope lists, counts).
//! Callers enqueue tag or path invalidations fire-and-forget; the queue
//! coalesces bursts inside a short debounce window and applies them in
//! fixed-size concurrent batches, with a pause between batches to bound
//! burst load on the cache layers.
//!
//! The worker is an explicit task owned by the queue: it is aborted on
//! shutdown, not leaked as an anonymous timer. Tasks do not survive a
//! crash — TTL expiry is the correctness backstop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use metrics::{gauge, histogram};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::error::CacheError;
use super::lock::lock_guard;

const SOURCE: &str = "cache::queue";

const METRIC_QUEUE_LEN: &str = "strato_cache_queue_len";
const METRIC_FLUSH_MS: &str = "strato_cache_flush_ms";

/// Where queued invalidations land. Implemented by the layered cache;
/// tests substitute recording or failing sinks.
#[async_trait]
pub trait InvalidationSink: Send + Sync {
    async fn apply_tag(&self, tag: &str) -> Result<(), CacheError>;
    async fn apply_path(&self, path: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Tag,
    Path,
}

impl TaskKind {
    fn as_str(self) -> &'static str {
        match self {
            TaskKind::Tag => "tag",
            TaskKind::Path => "path",
        }
    }
}

/// One queued invalidation. Identity only — applying the same task twice
/// is wasted work, not an error — so bursts coalesce by value.
#[derive(Debug, Clone)]
struct InvalidationTask {
    id: Uuid,
    value: String,
    queued_at: OffsetDateTime,
}

impl InvalidationTask {
    fn new(value: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            value,
            queued_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Pending counts as reported by the ops surface.
#[derive(Debug, Clone, Serialize)]
pub struct QueueDepth {
    pub tag_count: usize,
    pub path_count: usize,
    pub is_processing: bool,
}

struct QueueShared {
    sink: Arc<dyn InvalidationSink>,
    pending_tags: Mutex<HashMap<String, InvalidationTask>>,
    pending_paths: Mutex<HashMap<String, InvalidationTask>>,
    is_processing: AtomicBool,
    process_lock: tokio::sync::Mutex<()>,
    notify: Notify,
    debounce: Duration,
    tag_batch: usize,
    path_batch: usize,
    inter_batch_pause: Duration,
}

impl QueueShared {
    fn enqueue(&self, kind: TaskKind, values: impl IntoIterator<Item = String>) {
        let pending = match kind {
            TaskKind::Tag => &self.pending_tags,
            TaskKind::Path => &self.pending_paths,
        };

        let mut pending = lock_guard(pending, SOURCE, "enqueue");
        for value in values {
            if pending.contains_key(&value) {
                continue;
            }
            let task = InvalidationTask::new(value.clone());
            debug!(
                source = SOURCE,
                task_id = %task.id,
                kind = kind.as_str(),
                value = %task.value,
                "invalidation queued"
            );
            pending.insert(value, task);
        }
        let depth = pending.len();
        drop(pending);

        gauge!(METRIC_QUEUE_LEN, "kind" => kind.as_str()).set(depth as f64);
        self.notify.notify_one();
    }

    /// Drain and apply everything pending. Loops until both queues are
    /// empty so work enqueued mid-pass is picked up before going idle.
    async fn process_pending(&self) {
        let _pass = self.process_lock.lock().await;
        let started = Instant::now();
        self.is_processing.store(true, Ordering::Release);

        loop {
            let tags = self.drain(TaskKind::Tag);
            let paths = self.drain(TaskKind::Path);
            if tags.is_empty() && paths.is_empty() {
                break;
            }

            info!(
                source = SOURCE,
                tag_count = tags.len(),
                path_count = paths.len(),
                "applying queued invalidations"
            );

            self.apply_in_batches(TaskKind::Tag, tags, self.tag_batch).await;
            self.apply_in_batches(TaskKind::Path, paths, self.path_batch)
                .await;
        }

        self.is_processing.store(false, Ordering::Release);
        histogram!(METRIC_FLUSH_MS).record(started.elapsed().as_secs_f64() * 1000.0);
    }

    fn drain(&self, kind: TaskKind) -> Vec<InvalidationTask> {
        let pending = match kind {
            TaskKind::Tag => &self.pending_tags,
            TaskKind::Path => &self.pending_paths,
        };
        let drained: Vec<InvalidationTask> = lock_guard(pending, SOURCE, "drain")
            .drain()
            .map(|(_, task)| task)
            .collect();
        gauge!(METRIC_QUEUE_LEN, "kind" => kind.as_str()).set(0.0);
        drained
    }

    /// Apply tasks in fixed-size concurrent batches. A failed task is
    /// logged and isolated; its batch siblings and later batches still run.
    async fn apply_in_batches(&self, kind: TaskKind, tasks: Vec<InvalidationTask>, batch: usize) {
        for (index, chunk) in tasks.chunks(batch).enumerate() {
            if index > 0 && !self.inter_batch_pause.is_zero() {
                tokio::time::sleep(self.inter_batch_pause).await;
            }

            join_all(chunk.iter().map(|task| async move {
                let result = match kind {
                    TaskKind::Tag => self.sink.apply_tag(&task.value).await,
                    TaskKind::Path => self.sink.apply_path(&task.value).await,
                };
                if let Err(err) = result {
                    warn!(
                        source = SOURCE,
                        task_id = %task.id,
                        kind = kind.as_str(),
                        value = %task.value,
                        queued_at = %task.queued_at,
                        error = %err,
                        "invalidation task failed; batch continues"
                    );
                }
            }))
            .await;
        }
    }
}

/// Debounced dispatcher for fire-and-forget invalidations.
pub struct InvalidationQueue {
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InvalidationQueue {
    /// Build the queue and start its debounce worker.
    pub fn start(sink: Arc<dyn InvalidationSink>, config: &CacheConfig) -> Self {
        let shared = Arc::new(QueueShared {
            sink,
            pending_tags: Mutex::new(HashMap::new()),
            pending_paths: Mutex::new(HashMap::new()),
            is_processing: AtomicBool::new(false),
            process_lock: tokio::sync::Mutex::new(()),
            notify: Notify::new(),
            debounce: config.debounce(),
            tag_batch: config.tag_batch(),
            path_batch: config.path_batch(),
            inter_batch_pause: config.inter_batch_pause(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = tokio::spawn(async move {
            loop {
                worker_shared.notify.notified().await;
                tokio::time::sleep(worker_shared.debounce).await;
                worker_shared.process_pending().await;
            }
        });

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue tag invalidations. Returns immediately; the debounce worker
    /// applies them shortly after the burst quiets down.
    pub fn enqueue_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared
            .enqueue(TaskKind::Tag, tags.into_iter().map(Into::into));
    }

    /// Queue path invalidations (logical cache-path identifiers, applied
    /// as key-prefix flushes).
    pub fn enqueue_paths<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared
            .enqueue(TaskKind::Path, paths.into_iter().map(Into::into));
    }

    pub fn depth(&self) -> QueueDepth {
        QueueDepth {
            tag_count: lock_guard(&self.shared.pending_tags, SOURCE, "depth.tags").len(),
            path_count: lock_guard(&self.shared.pending_paths, SOURCE, "depth.paths").len(),
            is_processing: self.shared.is_processing.load(Ordering::Acquire),
        }
    }

    /// Apply everything pending right now, bypassing the debounce window.
    /// Used by tests and by graceful shutdown.
    pub async fn flush(&self) {
        self.shared.process_pending().await;
    }

    /// Stop the debounce worker. Pending tasks are not applied; call
    /// [`flush`](Self::flush) first for a graceful drain.
    pub fn shutdown(&self) {
        if let Some(worker) = lock_guard(&self.worker, SOURCE, "shutdown").take() {
            worker.abort();
            info!(source = SOURCE, "invalidation queue worker stopped");
        }
    }
}

impl Drop for InvalidationQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that records applied tasks and can be told to fail on a value.
    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<(String, String)>>,
        fail_on: Option<String>,
    }

    impl RecordingSink {
        fn failing_on(value: &str) -> Self {
            Self {
                applied: Mutex::new(Vec::new()),
                fail_on: Some(value.to_string()),
            }
        }

        fn applied(&self) -> Vec<(String, String)> {
            self.applied.lock().unwrap().clone()
        }

        fn record(&self, kind: &str, value: &str) -> Result<(), CacheError> {
            if self.fail_on.as_deref() == Some(value) {
                return Err(CacheError::invalidation(format!("refused {value}")));
            }
            self.applied
                .lock()
                .unwrap()
                .push((kind.to_string(), value.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl InvalidationSink for RecordingSink {
        async fn apply_tag(&self, tag: &str) -> Result<(), CacheError> {
            self.record("tag", tag)
        }

        async fn apply_path(&self, path: &str) -> Result<(), CacheError> {
            self.record("path", path)
        }
    }

    fn fast_config() -> CacheConfig {
        CacheConfig {
            debounce_ms: 20,
            inter_batch_pause_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn burst_coalesces_to_one_application_each() {
        let sink = Arc::new(RecordingSink::default());
        let queue = InvalidationQueue::start(sink.clone(), &fast_config());

        queue.enqueue_tags(["event:5", "event:6"]);
        queue.enqueue_tags(["event:5"]);
        queue.flush().await;

        let mut applied = sink.applied();
        applied.sort();
        assert_eq!(
            applied,
            vec![
                ("tag".to_string(), "event:5".to_string()),
                ("tag".to_string(), "event:6".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_task_does_not_halt_its_batch() {
        let sink = Arc::new(RecordingSink::failing_on("bad"));
        let queue = InvalidationQueue::start(sink.clone(), &fast_config());

        queue.enqueue_tags(["a", "bad", "c"]);
        queue.flush().await;

        let applied: Vec<String> = sink.applied().into_iter().map(|(_, v)| v).collect();
        assert_eq!(applied.len(), 2);
        assert!(applied.contains(&"a".to_string()));
        assert!(applied.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn worker_applies_after_debounce_without_explicit_flush() {
        let sink = Arc::new(RecordingSink::default());
        let queue = InvalidationQueue::start(sink.clone(), &fast_config());

        queue.enqueue_tags(["event:9"]);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(sink.applied().len(), 1);
        assert_eq!(queue.depth().tag_count, 0);
    }

    #[tokio::test]
    async fn paths_apply_through_the_path_sink() {
        let sink = Arc::new(RecordingSink::default());
        let queue = InvalidationQueue::start(sink.clone(), &fast_config());

        queue.enqueue_paths(["events:list"]);
        queue.flush().await;

        assert_eq!(
            sink.applied(),
            vec![("path".to_string(), "events:list".to_string())]
        );
    }

    #[tokio::test]
    async fn depth_reports_pending_counts() {
        let sink = Arc::new(RecordingSink::default());
        // Long debounce so nothing is applied while we look.
        let config = CacheConfig {
            debounce_ms: 60_000,
            ..Default::default()
        };
        let queue = InvalidationQueue::start(sink, &config);

        queue.enqueue_tags(["a", "b"]);
        queue.enqueue_paths(["p"]);

        let depth = queue.depth();
        assert_eq!(depth.tag_count, 2);
        assert_eq!(depth.path_count, 1);
        assert!(!depth.is_processing);
    }

    #[tokio::test]
    async fn shutdown_stops_the_worker() {
        let sink = Arc::new(RecordingSink::default());
        let queue = InvalidationQueue::start(sink.clone(), &fast_config());

        queue.shutdown();
        queue.enqueue_tags(["late"]);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Worker is gone; the task stays queued until an explicit flush.
        assert!(sink.applied().is_empty());
        assert_eq!(queue.depth().tag_count, 1);

        queue.flush().await;
        assert_eq!(sink.applied().len(), 1);
    }
}
