//! Operational HTTP surface.
//!
//! A small router for operators and health probes: statistics, queue
//! depth, and manual invalidation. This is the engine's own surface, not a
//! general-purpose cache protocol — callers embed the library directly.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::CacheService;

#[derive(Clone)]
pub struct OpsState {
    pub cache: Arc<CacheService>,
}

pub fn router(state: OpsState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/queue", get(queue_depth))
        .route("/invalidate/tags", post(invalidate_tags))
        .route("/invalidate/paths", post(invalidate_paths))
        .route("/invalidate/key/{key}", post(invalidate_key))
        .route("/cache", delete(flush_cache))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    remote_available: bool,
}

async fn health(State(state): State<OpsState>) -> Response {
    let remote_available = state.cache.remote_ping().await;
    Json(HealthBody {
        status: "ok",
        remote_available,
    })
    .into_response()
}

async fn stats(State(state): State<OpsState>) -> Response {
    Json(state.cache.stats()).into_response()
}

async fn queue_depth(State(state): State<OpsState>) -> Response {
    Json(state.cache.queue_depth()).into_response()
}

#[derive(Deserialize)]
struct TagsBody {
    tags: Vec<String>,
}

async fn invalidate_tags(State(state): State<OpsState>, Json(body): Json<TagsBody>) -> Response {
    if body.tags.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    info!(count = body.tags.len(), "operator tag invalidation");
    state.cache.enqueue_tag_invalidation(body.tags);
    StatusCode::ACCEPTED.into_response()
}

#[derive(Deserialize)]
struct PathsBody {
    paths: Vec<String>,
}

async fn invalidate_paths(State(state): State<OpsState>, Json(body): Json<PathsBody>) -> Response {
    if body.paths.is_empty() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    info!(count = body.paths.len(), "operator path invalidation");
    state.cache.enqueue_path_invalidation(body.paths);
    StatusCode::ACCEPTED.into_response()
}

async fn invalidate_key(State(state): State<OpsState>, Path(key): Path<String>) -> Response {
    info!(key = %key, "operator key invalidation");
    state.cache.invalidate_key(&key).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn flush_cache(State(state): State<OpsState>) -> Response {
    info!("operator full cache flush");
    state.cache.flush_all().await;
    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::cache::{CacheConfig, GetOptions, RemoteCache};

    use super::*;

    fn ops_router() -> (Router, Arc<CacheService>) {
        let cache = Arc::new(CacheService::new(
            CacheConfig {
                debounce_ms: 20,
                ..Default::default()
            },
            RemoteCache::disabled(),
        ));
        let router = router(OpsState {
            cache: Arc::clone(&cache),
        });
        (router, cache)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stats_reports_counters_and_occupancy() {
        let (router, cache) = ops_router();

        let _: u32 = cache
            .get_or_compute("k", GetOptions::new(), || async {
                Ok::<_, std::io::Error>(1)
            })
            .await
            .unwrap();

        let response = router
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["compute_count"], 1);
        assert_eq!(body["memory_size"], 1);
        assert_eq!(body["memory_max_size"], 500);
        assert_eq!(body["remote_available"], false);
    }

    #[tokio::test]
    async fn health_reports_remote_down_when_disabled() {
        let (router, _cache) = ops_router();

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["remote_available"], false);
    }

    #[tokio::test]
    async fn tag_invalidation_endpoint_enqueues() {
        let (router, cache) = ops_router();

        let request = Request::post("/invalidate/tags")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"tags":["events:1","event-list"]}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(cache.queue_depth().tag_count, 2);
    }

    #[tokio::test]
    async fn empty_tag_list_is_rejected() {
        let (router, _cache) = ops_router();

        let request = Request::post("/invalidate/tags")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"tags":[]}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn key_invalidation_removes_the_entry() {
        let (router, cache) = ops_router();

        let _: u32 = cache
            .get_or_compute("events:9:detail", GetOptions::new(), || async {
                Ok::<_, std::io::Error>(9)
            })
            .await
            .unwrap();

        let response = router
            .oneshot(
                Request::post("/invalidate/key/events:9:detail")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(cache.layered().memory().get("events:9:detail").is_none());
    }

    #[tokio::test]
    async fn cache_flush_empties_the_store() {
        let (router, cache) = ops_router();

        let _: u32 = cache
            .get_or_compute("k", GetOptions::new(), || async {
                Ok::<_, std::io::Error>(1)
            })
            .await
            .unwrap();

        let response = router
            .oneshot(Request::delete("/cache").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(cache.stats().memory_size, 0);
    }
}
