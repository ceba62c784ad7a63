//! Table cache for FileDB
//!
//! In-memory mirror of each entity type's records, keyed by primary key.
//! It only accelerates point lookups; scans always go back to disk.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::storage::record::{PrimaryKey, Record};

/// Per-entity-type map from primary key to record
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<String, IndexMap<PrimaryKey, Record>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str, key: &PrimaryKey) -> Option<&Record> {
        self.tables.get(entity)?.get(key)
    }

    /// Insert or replace one record. A replaced record keeps its position.
    pub fn put(&mut self, entity: &str, key: PrimaryKey, record: Record) {
        self.tables
            .entry(entity.to_string())
            .or_default()
            .insert(key, record);
    }

    pub fn remove(&mut self, entity: &str, key: &PrimaryKey) -> Option<Record> {
        self.tables.get_mut(entity)?.shift_remove(key)
    }

    /// Swap in a freshly loaded table
    pub fn replace<I>(&mut self, entity: &str, records: I)
    where
        I: IntoIterator<Item = (PrimaryKey, Record)>,
    {
        self.tables
            .insert(entity.to_string(), records.into_iter().collect());
    }

    pub fn len(&self, entity: &str) -> usize {
        self.tables.get(entity).map(IndexMap::len).unwrap_or(0)
    }

    /// Snapshot of a table's cached records, in cache order
    pub fn records(&self, entity: &str) -> Vec<(PrimaryKey, Record)> {
        self.tables
            .get(entity)
            .map(|table| {
                table
                    .iter()
                    .map(|(k, r)| (k.clone(), r.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::record_from;
    use serde_json::json;

    #[test]
    fn test_put_get_remove() {
        let mut cache = TableCache::new();
        let key = PrimaryKey::id("t1");
        cache.put("tasks", key.clone(), record_from([("id", json!("t1"))]));

        assert_eq!(cache.len("tasks"), 1);
        assert_eq!(cache.get("tasks", &key).unwrap()["id"], json!("t1"));
        assert!(cache.get("stages", &key).is_none());

        assert!(cache.remove("tasks", &key).is_some());
        assert!(cache.remove("tasks", &key).is_none());
        assert_eq!(cache.len("tasks"), 0);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut cache = TableCache::new();
        for id in ["a", "b", "c"] {
            cache.put("tasks", PrimaryKey::id(id), record_from([("id", json!(id))]));
        }
        cache.put(
            "tasks",
            PrimaryKey::id("a"),
            record_from([("id", json!("a")), ("name", json!("renamed"))]),
        );

        let keys: Vec<PrimaryKey> = cache.records("tasks").into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![PrimaryKey::id("a"), PrimaryKey::id("b"), PrimaryKey::id("c")]
        );
    }

    #[test]
    fn test_replace_table() {
        let mut cache = TableCache::new();
        cache.put("tasks", PrimaryKey::id("stale"), Record::new());
        cache.replace("tasks", vec![(PrimaryKey::id("fresh"), Record::new())]);

        assert_eq!(cache.len("tasks"), 1);
        assert!(cache.get("tasks", &PrimaryKey::id("stale")).is_none());
    }
}
