//! Tag index for grouped invalidation.
//!
//! Maps an opaque tag to the set of cache keys depending on it, and keeps
//! the reverse mapping so key eviction can clean up its tag memberships.
//! The index is auxiliary metadata, never authoritative storage: losing it
//! only coarsens invalidation, it cannot make the cache serve a value past
//! its TTL.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::lock::{read_guard, write_guard};

const SOURCE: &str = "cache::tags";

/// Bidirectional tag ↔ key index.
///
/// One key may carry several tags; one tag covers many keys. Tag entries
/// are created on first association and dropped when their key set empties.
#[derive(Default)]
pub struct TagIndex {
    tag_to_keys: RwLock<HashMap<String, HashSet<String>>>,
    key_to_tags: RwLock<HashMap<String, HashSet<String>>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a key with each of the given tags.
    pub fn register(&self, key: &str, tags: &[String]) {
        if tags.is_empty() {
            return;
        }

        let mut by_tag = write_guard(&self.tag_to_keys, SOURCE, "register.by_tag");
        let mut by_key = write_guard(&self.key_to_tags, SOURCE, "register.by_key");

        for tag in tags {
            by_tag
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        by_key
            .entry(key.to_string())
            .or_default()
            .extend(tags.iter().cloned());
    }

    /// All keys currently associated with a tag.
    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        read_guard(&self.tag_to_keys, SOURCE, "keys_for_tag")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// All tags a key is registered under.
    pub fn tags_for_key(&self, key: &str) -> HashSet<String> {
        read_guard(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a key from the index, cleaning up every tag that referenced it.
    /// Tag entries left empty are removed.
    pub fn remove_key(&self, key: &str) {
        let mut by_tag = write_guard(&self.tag_to_keys, SOURCE, "remove_key.by_tag");
        let mut by_key = write_guard(&self.key_to_tags, SOURCE, "remove_key.by_key");

        if let Some(tags) = by_key.remove(key) {
            for tag in tags {
                if let Some(keys) = by_tag.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        by_tag.remove(&tag);
                    }
                }
            }
        }
    }

    /// Drop a tag entry outright, returning the keys it covered. Reverse
    /// mappings are cleaned; removing an unknown tag is a no-op.
    pub fn remove_tag(&self, tag: &str) -> HashSet<String> {
        let mut by_tag = write_guard(&self.tag_to_keys, SOURCE, "remove_tag.by_tag");
        let mut by_key = write_guard(&self.key_to_tags, SOURCE, "remove_tag.by_key");

        let covered = by_tag.remove(tag).unwrap_or_default();
        for key in &covered {
            if let Some(tags) = by_key.get_mut(key) {
                tags.remove(tag);
                if tags.is_empty() {
                    by_key.remove(key);
                }
            }
        }
        covered
    }

    /// Drop every key matching the predicate; returns the removed keys.
    /// Used by pattern invalidation to keep the index in step with keys
    /// flushed from layers this process never read back.
    pub fn remove_keys_matching(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let matched: Vec<String> = read_guard(&self.key_to_tags, SOURCE, "remove_keys_matching")
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in &matched {
            self.remove_key(key);
        }
        matched
    }

    pub fn clear(&self) {
        write_guard(&self.tag_to_keys, SOURCE, "clear.by_tag").clear();
        write_guard(&self.key_to_tags, SOURCE, "clear.by_key").clear();
    }

    pub fn tag_count(&self) -> usize {
        read_guard(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        read_guard(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn register_and_lookup_both_directions() {
        let index = TagIndex::new();

        index.register("events:1:detail", &tags(&["events", "events:1"]));

        let keys = index.keys_for_tag("events:1");
        assert!(keys.contains("events:1:detail"));

        let key_tags = index.tags_for_key("events:1:detail");
        assert_eq!(key_tags.len(), 2);
        assert!(key_tags.contains("events"));
    }

    #[test]
    fn one_tag_covers_many_keys() {
        let index = TagIndex::new();

        index.register("events:1:detail", &tags(&["events"]));
        index.register("events:2:detail", &tags(&["events"]));

        assert_eq!(index.keys_for_tag("events").len(), 2);
        assert_eq!(index.tag_count(), 1);
        assert_eq!(index.key_count(), 2);
    }

    #[test]
    fn remove_key_drops_empty_tag_entries() {
        let index = TagIndex::new();

        index.register("events:1:detail", &tags(&["events", "events:1"]));
        index.register("events:2:detail", &tags(&["events"]));

        index.remove_key("events:1:detail");

        // "events:1" only covered the removed key, so its entry is gone.
        assert!(index.keys_for_tag("events:1").is_empty());
        assert_eq!(index.tag_count(), 1);
        assert_eq!(index.keys_for_tag("events").len(), 1);
    }

    #[test]
    fn remove_tag_returns_covered_keys_and_cleans_reverse() {
        let index = TagIndex::new();

        index.register("a", &tags(&["t", "u"]));
        index.register("b", &tags(&["t"]));

        let covered = index.remove_tag("t");
        assert_eq!(covered.len(), 2);

        // "b" carried only "t" and is gone from the reverse map; "a" keeps "u".
        assert!(index.tags_for_key("b").is_empty());
        let expected: HashSet<String> = tags(&["u"]).into_iter().collect();
        assert_eq!(index.tags_for_key("a"), expected);
    }

    #[test]
    fn removing_unknown_tag_or_key_is_a_no_op() {
        let index = TagIndex::new();

        assert!(index.remove_tag("missing").is_empty());
        index.remove_key("missing");
        assert_eq!(index.tag_count(), 0);
        assert_eq!(index.key_count(), 0);
    }

    #[test]
    fn register_with_no_tags_registers_nothing() {
        let index = TagIndex::new();
        index.register("a", &[]);
        assert_eq!(index.key_count(), 0);
    }

    #[test]
    fn remove_keys_matching_prunes_by_pattern() {
        let index = TagIndex::new();

        index.register("events:list:p1", &tags(&["event-list"]));
        index.register("events:list:p2", &tags(&["event-list"]));
        index.register("orders:1", &tags(&["orders"]));

        let mut removed = index.remove_keys_matching(|key| key.starts_with("events:list:"));
        removed.sort();

        assert_eq!(removed, vec!["events:list:p1", "events:list:p2"]);
        assert!(index.keys_for_tag("event-list").is_empty());
        assert_eq!(index.key_count(), 1);
    }
}
