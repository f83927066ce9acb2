//! Domain cache facades.
//!
//! Each data shape gets a fixed pairing of key-naming scheme, TTL tier,
//! and tag set, so call sites never assemble raw keys or tag lists.
//! Mutation-side helpers enqueue the matching invalidations through the
//! debounced queue.
//!
//! TTL tiers: entity details and lists ride the default five minutes;
//! aggregate counts stay fresh at thirty seconds; per-identity data at ten;
//! taxonomies, which rarely move, at thirty minutes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::layered::GetOptions;
use super::service::CacheService;

pub const TTL_ENTITY_DETAIL: Duration = Duration::from_secs(300);
pub const TTL_ENTITY_LIST: Duration = Duration::from_secs(300);
pub const TTL_AGGREGATE_COUNTS: Duration = Duration::from_secs(30);
pub const TTL_IDENTITY_DATA: Duration = Duration::from_secs(10);
pub const TTL_TAXONOMY: Duration = Duration::from_secs(1800);

/// Key for a single entity's detail view.
pub fn detail_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}:detail")
}

/// Key for one page of a filtered entity list.
pub fn list_key(kind: &str, scope: &str, page: u32) -> String {
    format!("{kind}:list:{scope}:{page}")
}

/// Path identifier covering every list page of a kind.
pub fn list_path(kind: &str) -> String {
    format!("{kind}:list")
}

/// Key for an entity's aggregate counts.
pub fn counts_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}:counts")
}

/// Key for one view of a caller identity's data.
pub fn identity_key(identity: &str, view: &str) -> String {
    format!("identity:{identity}:{view}")
}

/// Key for a named taxonomy.
pub fn taxonomy_key(name: &str) -> String {
    format!("taxonomy:{name}")
}

fn entity_tag(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

fn list_tag(kind: &str) -> String {
    format!("{kind}-list")
}

fn scope_tag(kind: &str, scope: &str) -> String {
    format!("{kind}-scope:{scope}")
}

fn identity_tag(identity: &str) -> String {
    format!("identity:{identity}")
}

/// Shape-aware front door to the cache service.
#[derive(Clone)]
pub struct DomainCache {
    service: Arc<CacheService>,
}

impl DomainCache {
    pub fn new(service: Arc<CacheService>) -> Self {
        Self { service }
    }

    /// Detail view of one entity. Five-minute tier, tagged by kind and id.
    pub async fn entity_detail<T, E, F, Fut>(
        &self,
        kind: &str,
        id: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let options = GetOptions::new()
            .ttl(TTL_ENTITY_DETAIL)
            .tags([kind.to_string(), entity_tag(kind, id)]);
        self.service
            .get_or_compute(&detail_key(kind, id), options, compute)
            .await
    }

    /// One page of a scoped entity list. Five-minute tier, tagged by kind,
    /// the kind's list tag, and the scope.
    pub async fn entity_list<T, E, F, Fut>(
        &self,
        kind: &str,
        scope: &str,
        page: u32,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let options = GetOptions::new().ttl(TTL_ENTITY_LIST).tags([
            kind.to_string(),
            list_tag(kind),
            scope_tag(kind, scope),
        ]);
        self.service
            .get_or_compute(&list_key(kind, scope, page), options, compute)
            .await
    }

    /// Aggregate counts for one entity. Thirty-second tier.
    pub async fn aggregate_counts<T, E, F, Fut>(
        &self,
        kind: &str,
        id: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let options = GetOptions::new()
            .ttl(TTL_AGGREGATE_COUNTS)
            .tags(["counts".to_string(), entity_tag(kind, id)]);
        self.service
            .get_or_compute(&counts_key(kind, id), options, compute)
            .await
    }

    /// Per-caller-identity data. Ten-second tier.
    pub async fn identity_view<T, E, F, Fut>(
        &self,
        identity: &str,
        view: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let options = GetOptions::new()
            .ttl(TTL_IDENTITY_DATA)
            .tags(["identity-data".to_string(), identity_tag(identity)]);
        self.service
            .get_or_compute(&identity_key(identity, view), options, compute)
            .await
    }

    /// Rarely-changing taxonomy data. Thirty-minute tier.
    pub async fn taxonomy<T, E, F, Fut>(&self, name: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let options = GetOptions::new()
            .ttl(TTL_TAXONOMY)
            .tags(["taxonomy".to_string()]);
        self.service
            .get_or_compute(&taxonomy_key(name), options, compute)
            .await
    }

    /// An entity was created, updated, or deleted: drop its detail and
    /// counts (by tag), every list that may include it (by tag), and flush
    /// the list key space (by path) for pages cached under scopes this
    /// process never read.
    pub fn entity_changed(&self, kind: &str, id: &str) {
        self.service
            .enqueue_tag_invalidation([entity_tag(kind, id), list_tag(kind)]);
        self.service.enqueue_path_invalidation([list_path(kind)]);
    }

    /// Everything under one list scope changed (e.g. a bulk import).
    pub fn scope_changed(&self, kind: &str, scope: &str) {
        self.service
            .enqueue_tag_invalidation([scope_tag(kind, scope)]);
    }

    /// A caller identity's data changed.
    pub fn identity_changed(&self, identity: &str) {
        self.service.enqueue_tag_invalidation([identity_tag(identity)]);
    }

    /// A taxonomy changed; drops every taxonomy key.
    pub fn taxonomy_changed(&self) {
        self.service.enqueue_tag_invalidation(["taxonomy"]);
    }
}
