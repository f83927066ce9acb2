//! Verifies the cache paths emit the expected metric keys.
//!
//! Runs as its own integration binary because the debugging recorder
//! installs process-globally.

use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use strato::cache::{CacheConfig, CacheService, GetOptions, RemoteCache};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let cache = Arc::new(CacheService::new(
        CacheConfig {
            memory_max_entries: 1,
            debounce_ms: 10,
            inter_batch_pause_ms: 0,
            ..Default::default()
        },
        RemoteCache::disabled(),
    ));

    // Miss + compute, hit, and a capacity eviction.
    let _: u32 = cache
        .get_or_compute("a", GetOptions::new().tags(["t"]), || async {
            Ok::<_, std::io::Error>(1)
        })
        .await
        .unwrap();
    let _: u32 = cache
        .get_or_compute("a", GetOptions::new(), || async {
            Ok::<_, std::io::Error>(1)
        })
        .await
        .unwrap();
    let _: u32 = cache
        .get_or_compute("b", GetOptions::new(), || async {
            Ok::<_, std::io::Error>(2)
        })
        .await
        .unwrap();

    // Queue gauge and flush histogram.
    cache.enqueue_tag_invalidation(["t"]);
    cache.flush_queue().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = snapshotter.snapshot().into_vec();
    let keys: Vec<String> = snapshot
        .iter()
        .map(|(composite, _, _, _)| composite.key().name().to_string())
        .collect();

    for expected in [
        "strato_cache_memory_hit_total",
        "strato_cache_memory_miss_total",
        "strato_cache_compute_total",
        "strato_cache_evict_total",
        "strato_cache_queue_len",
        "strato_cache_flush_ms",
    ] {
        assert!(
            keys.iter().any(|key| key == expected),
            "missing metric key {expected}, saw: {keys:?}"
        );
    }

    // Remote layer disabled: no remote traffic recorded.
    assert!(
        !keys
            .iter()
            .any(|key| key == "strato_cache_remote_hit_total")
    );
}
