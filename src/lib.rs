//! Strato: a multi-layer read-through cache.
//!
//! A bounded in-process LRU/TTL store in front of an optional Redis layer,
//! with tag-based dependency tracking, a debounced batched invalidation
//! queue, and domain facades that fix key naming, TTL tier, and tag set
//! per data shape.
//!
//! The engine is a library: callers construct a [`cache::CacheService`] at
//! startup, hand it a compute callback per read, and emit invalidation
//! signals on mutation. The bundled binary wraps the same service in a
//! small operational HTTP surface.

pub mod cache;
pub mod config;
pub mod infra;
