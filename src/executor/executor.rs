//! Query Executor for FileDB
//!
//! This module runs a typed `Query` against one entity type and returns
//! the result. Shapes the entity type does not support degrade to an empty
//! result and a warning instead of an error; I/O failures propagate.

use serde_json::Value;
use tracing::{debug, warn};

use super::query::{matches_all, Filter, FilterOp, MatchBy, OnConflict, Query, SortBy};
use crate::catalog::EntityType;
use crate::error::Result;
use crate::storage::{PrimaryKey, Record, StorageEngine};

/// Outcome of a mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    /// Number of records inserted, updated or deleted
    pub changes: usize,
    /// Key of the record an insert stored
    pub inserted_key: Option<PrimaryKey>,
}

impl RunResult {
    pub fn changed(changes: usize) -> Self {
        Self {
            changes,
            inserted_key: None,
        }
    }

    pub fn inserted(key: PrimaryKey) -> Self {
        Self {
            changes: 1,
            inserted_key: Some(key),
        }
    }
}

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Point lookup
    Record(Option<Record>),
    /// Filter scan, in result order
    Records(Vec<Record>),
    /// Count
    Count(usize),
    /// Insert, update or delete
    Run(RunResult),
}

impl QueryResult {
    /// The result an unanswerable query of this shape yields
    pub fn empty(query: &Query) -> Self {
        match query {
            Query::PointLookup { .. } => QueryResult::Record(None),
            Query::FilterScan { .. } => QueryResult::Records(Vec::new()),
            Query::Count { .. } => QueryResult::Count(0),
            Query::Insert { .. } | Query::Update { .. } | Query::Delete { .. } => {
                QueryResult::Run(RunResult::default())
            }
        }
    }

    /// First record of the result. A count reads as `{ alias: n }`.
    pub fn into_record(self, count_alias: &str) -> Option<Record> {
        match self {
            QueryResult::Record(record) => record,
            QueryResult::Records(records) => records.into_iter().next(),
            QueryResult::Count(n) => Some(count_record(count_alias, n)),
            QueryResult::Run(_) => None,
        }
    }

    /// Every record of the result. A count reads as a one-element list.
    pub fn into_records(self, count_alias: &str) -> Vec<Record> {
        match self {
            QueryResult::Record(record) => record.into_iter().collect(),
            QueryResult::Records(records) => records,
            QueryResult::Count(n) => vec![count_record(count_alias, n)],
            QueryResult::Run(_) => Vec::new(),
        }
    }

    /// Mutation outcome; reads changed nothing
    pub fn into_run(self) -> RunResult {
        match self {
            QueryResult::Run(run) => run,
            _ => RunResult::default(),
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(n) => Some(*n),
            _ => None,
        }
    }
}

fn count_record(alias: &str, n: usize) -> Record {
    let mut record = Record::with_capacity(1);
    record.insert(alias.to_string(), Value::from(n));
    record
}

/// Runs queries against a single entity type
pub struct Executor<'a> {
    engine: &'a StorageEngine,
    entity: &'a EntityType,
}

impl<'a> Executor<'a> {
    pub fn new(engine: &'a StorageEngine, entity: &'a EntityType) -> Self {
        Self { engine, entity }
    }

    /// Execute a query
    pub fn execute(&self, query: Query) -> Result<QueryResult> {
        match query {
            Query::PointLookup { key } => self.execute_lookup(&key),
            Query::FilterScan {
                filters,
                sort,
                limit,
            } => self.execute_scan(&filters, sort.as_ref(), limit),
            Query::Count { filters } => self.execute_count(&filters),
            Query::Insert {
                record,
                on_conflict,
            } => self.execute_insert(record, on_conflict),
            Query::Update { target, set } => self.execute_update(target, set),
            Query::Delete { target } => self.execute_delete(target),
        }
    }

    fn execute_lookup(&self, key: &PrimaryKey) -> Result<QueryResult> {
        if key.validate().is_err() {
            warn!(entity = self.entity.name(), key = %key, "lookup with unusable key");
            return Ok(QueryResult::Record(None));
        }
        Ok(QueryResult::Record(self.engine.get(self.entity, key)?))
    }

    fn execute_scan(
        &self,
        filters: &[Filter],
        sort: Option<&SortBy>,
        limit: Option<usize>,
    ) -> Result<QueryResult> {
        if !self.filters_supported(filters) {
            return Ok(QueryResult::Records(Vec::new()));
        }

        let mut records: Vec<Record> = self
            .matching(filters)?
            .into_iter()
            .map(|(_, record)| record)
            .collect();

        if let Some(sort) = sort {
            if self.entity.is_sortable(&sort.field) {
                sort.apply(&mut records);
            } else {
                debug!(entity = self.entity.name(), field = %sort.field, "sort ignored");
            }
        }
        if let Some(limit) = limit {
            records.truncate(limit);
        }

        Ok(QueryResult::Records(records))
    }

    /// Filtered for a single filterable field or a declared count shape;
    /// anything else counts the whole entity type.
    fn execute_count(&self, filters: &[Filter]) -> Result<QueryResult> {
        let fields: Vec<&str> = filters.iter().map(|f| f.field.as_str()).collect();
        let recognized = filters.iter().all(|f| f.op == FilterOp::Eq)
            && self.entity.is_count_shape(&fields);

        let records = self.engine.scan(self.entity)?;
        if !recognized {
            warn!(
                entity = self.entity.name(),
                fields = ?fields,
                "unrecognized count shape, counting every record"
            );
            return Ok(QueryResult::Count(records.len()));
        }

        let count = records
            .iter()
            .filter(|(_, record)| matches_all(filters, record))
            .count();
        Ok(QueryResult::Count(count))
    }

    fn execute_insert(&self, record: Record, on_conflict: OnConflict) -> Result<QueryResult> {
        let record = self.entity.apply_defaults(record);

        let saved = match on_conflict {
            OnConflict::Replace => Some(self.engine.save(self.entity, record)?),
            OnConflict::Ignore => self.engine.save_if_absent(self.entity, record)?,
        };

        Ok(QueryResult::Run(match saved {
            Some((key, _)) => RunResult::inserted(key),
            None => RunResult::default(),
        }))
    }

    fn execute_update(&self, target: MatchBy, set: Record) -> Result<QueryResult> {
        if set.is_empty() {
            warn!(entity = self.entity.name(), "update without assignments");
            return Ok(QueryResult::Run(RunResult::default()));
        }
        if let Some(field) = set.keys().find(|f| self.entity.key().is_key_field(f)) {
            warn!(entity = self.entity.name(), field = %field, "update of a key field");
            return Ok(QueryResult::Run(RunResult::default()));
        }

        let updated = match target {
            MatchBy::Key(key) => {
                key.validate().is_ok() && self.engine.update_key(self.entity, &key, &set)?
            }
            MatchBy::Filters(filters) => {
                if filters.is_empty() {
                    warn!(entity = self.entity.name(), "update without a target");
                    return Ok(QueryResult::Run(RunResult::default()));
                }
                if !self.filters_supported(&filters) {
                    return Ok(QueryResult::Run(RunResult::default()));
                }
                self.engine
                    .update_first(self.entity, |record| matches_all(&filters, record), &set)?
                    .is_some()
            }
        };

        Ok(QueryResult::Run(RunResult::changed(usize::from(updated))))
    }

    fn execute_delete(&self, target: MatchBy) -> Result<QueryResult> {
        let changes = match target {
            MatchBy::Key(key) => {
                if key.validate().is_err() {
                    0
                } else {
                    usize::from(self.engine.delete(self.entity, &key)?)
                }
            }
            MatchBy::Filters(filters) => {
                if !self.filters_supported(&filters) {
                    return Ok(QueryResult::Run(RunResult::default()));
                }
                let mut removed = 0;
                for (key, _) in self.matching(&filters)? {
                    if self.engine.delete(self.entity, &key)? {
                        removed += 1;
                    }
                }
                removed
            }
        };

        Ok(QueryResult::Run(RunResult::changed(changes)))
    }

    /// Records passing every filter, read fresh from disk in key order
    fn matching(&self, filters: &[Filter]) -> Result<Vec<(PrimaryKey, Record)>> {
        let mut records = self.engine.scan(self.entity)?;
        records.retain(|(_, record)| matches_all(filters, record));
        Ok(records)
    }

    /// Equality on filterable fields, `<` on timestamp fields
    fn filters_supported(&self, filters: &[Filter]) -> bool {
        let unsupported = filters.iter().find(|f| match f.op {
            FilterOp::Eq => !self.entity.is_filterable(&f.field),
            FilterOp::Before => !self.entity.is_timestamp(&f.field),
        });

        match unsupported {
            Some(filter) => {
                warn!(
                    entity = self.entity.name(),
                    field = %filter.field,
                    "unsupported filter, returning nothing"
                );
                false
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{bot_catalog, Catalog};
    use crate::config::StoreConfig;
    use crate::storage::record_from;
    use serde_json::json;

    fn create_test_engine() -> (tempfile::TempDir, StorageEngine, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::new(&StoreConfig::new().data_dir(dir.path()));
        let catalog = bot_catalog().unwrap();
        engine.open(&catalog).unwrap();
        (dir, engine, catalog)
    }

    fn insert(executor: &Executor<'_>, record: Record) -> RunResult {
        executor.execute(Query::insert(record)).unwrap().into_run()
    }

    #[test]
    fn test_insert_applies_defaults() {
        let (_dir, engine, catalog) = create_test_engine();
        let stages = catalog.get("stages").unwrap();
        let executor = Executor::new(&engine, &stages);

        let run = insert(
            &executor,
            record_from([
                ("task_id", json!("t1")),
                ("idx", json!(0)),
                ("name", json!("Plan")),
            ]),
        );
        assert_eq!(run.changes, 1);
        assert_eq!(run.inserted_key, Some(PrimaryKey::composite("t1", 0)));

        let record = executor
            .execute(Query::lookup(PrimaryKey::composite("t1", 0)))
            .unwrap()
            .into_record("count")
            .unwrap();
        assert_eq!(record["done"], json!(0));
        assert_eq!(record["assignee_id"], Value::Null);
        assert!(record["created_at"].is_string());
    }

    #[test]
    fn test_insert_or_ignore() {
        let (_dir, engine, catalog) = create_test_engine();
        let settings = catalog.get("settings").unwrap();
        let executor = Executor::new(&engine, &settings);

        insert(&executor, record_from([("key", json!("motd")), ("value", json!("hi"))]));
        let run = executor
            .execute(Query::insert_or_ignore(record_from([
                ("key", json!("motd")),
                ("value", json!("bye")),
            ])))
            .unwrap()
            .into_run();
        assert_eq!(run, RunResult::default());

        let record = executor
            .execute(Query::lookup("motd"))
            .unwrap()
            .into_record("count")
            .unwrap();
        assert_eq!(record["value"], json!("hi"));
    }

    #[test]
    fn test_scan_sort_and_limit() {
        let (_dir, engine, catalog) = create_test_engine();
        let stages = catalog.get("stages").unwrap();
        let executor = Executor::new(&engine, &stages);

        for idx in [2, 0, 1] {
            insert(
                &executor,
                record_from([("task_id", json!("t1")), ("idx", json!(idx))]),
            );
        }
        insert(&executor, record_from([("task_id", json!("t2")), ("idx", json!(0))]));

        let query = Query::scan(vec![Filter::eq("task_id", "t1")])
            .sorted(SortBy::desc("idx"))
            .limited(2);
        let records = executor.execute(query).unwrap().into_records("count");
        let indices: Vec<&Value> = records.iter().map(|r| &r["idx"]).collect();
        assert_eq!(indices, vec![&json!(2), &json!(1)]);
    }

    #[test]
    fn test_scan_unfilterable_field_is_empty() {
        let (_dir, engine, catalog) = create_test_engine();
        let tasks = catalog.get("tasks").unwrap();
        let executor = Executor::new(&engine, &tasks);
        insert(&executor, record_from([("id", json!("t1")), ("name", json!("Demo"))]));

        let result = executor
            .execute(Query::scan(vec![Filter::eq("name", "Demo")]))
            .unwrap();
        assert_eq!(result, QueryResult::Records(Vec::new()));
    }

    #[test]
    fn test_count_fallback() {
        let (_dir, engine, catalog) = create_test_engine();
        let issues = catalog.get("issues").unwrap();
        let executor = Executor::new(&engine, &issues);

        insert(&executor, record_from([("status", json!("open")), ("severity", json!("high"))]));
        insert(&executor, record_from([("status", json!("closed")), ("severity", json!("high"))]));
        insert(&executor, record_from([("status", json!("open")), ("severity", json!("low"))]));

        let by_status = executor
            .execute(Query::count(vec![Filter::eq("status", "open")]))
            .unwrap();
        assert_eq!(by_status.count(), Some(2));

        let by_severity = executor
            .execute(Query::count(vec![Filter::eq("severity", "high")]))
            .unwrap();
        assert_eq!(by_severity.count(), Some(2));

        let by_missing_id = executor
            .execute(Query::count(vec![Filter::eq("id", "nope")]))
            .unwrap();
        assert_eq!(by_missing_id.count(), Some(0));

        // (status, severity) is not a declared count shape
        let by_both = executor
            .execute(Query::count(vec![
                Filter::eq("status", "open"),
                Filter::eq("severity", "low"),
            ]))
            .unwrap();
        assert_eq!(by_both.count(), Some(3));
    }

    #[test]
    fn test_update_first_match_preserves_fields() {
        let (_dir, engine, catalog) = create_test_engine();
        let stages = catalog.get("stages").unwrap();
        let executor = Executor::new(&engine, &stages);
        for idx in [1, 0] {
            insert(
                &executor,
                record_from([
                    ("task_id", json!("t1")),
                    ("idx", json!(idx)),
                    ("name", json!(format!("stage {}", idx))),
                ]),
            );
        }

        let run = executor
            .execute(Query::update(
                MatchBy::Filters(vec![Filter::eq("task_id", "t1"), Filter::eq("done", 0)]),
                record_from([("done", json!(1))]),
            ))
            .unwrap()
            .into_run();
        assert_eq!(run.changes, 1);

        let first = engine
            .get(&stages, &PrimaryKey::composite("t1", 0))
            .unwrap()
            .unwrap();
        let second = engine
            .get(&stages, &PrimaryKey::composite("t1", 1))
            .unwrap()
            .unwrap();
        assert_eq!(first["done"], json!(1));
        assert_eq!(first["name"], json!("stage 0"));
        assert_eq!(second["done"], json!(0));
    }

    #[test]
    fn test_update_rejects_key_fields() {
        let (_dir, engine, catalog) = create_test_engine();
        let tasks = catalog.get("tasks").unwrap();
        let executor = Executor::new(&engine, &tasks);
        insert(&executor, record_from([("id", json!("t1"))]));

        let run = executor
            .execute(Query::update(
                MatchBy::Key(PrimaryKey::id("t1")),
                record_from([("id", json!("t2"))]),
            ))
            .unwrap()
            .into_run();
        assert_eq!(run.changes, 0);
        assert!(engine.get(&tasks, &PrimaryKey::id("t1")).unwrap().is_some());
    }

    #[test]
    fn test_delete_by_filter_and_cutoff() {
        let (_dir, engine, catalog) = create_test_engine();
        let changelogs = catalog.get("changelogs").unwrap();
        let executor = Executor::new(&engine, &changelogs);
        for (id, at) in [
            ("a", "2024-01-01T00:00:00.000Z"),
            ("b", "2024-02-01T00:00:00.000Z"),
            ("c", "2024-03-01T00:00:00.000Z"),
        ] {
            insert(&executor, record_from([("id", json!(id)), ("created_at", json!(at))]));
        }

        let run = executor
            .execute(Query::delete(MatchBy::Filters(vec![Filter::before(
                "created_at",
                "2024-02-15T00:00:00.000Z",
            )])))
            .unwrap()
            .into_run();
        assert_eq!(run.changes, 2);
        assert_eq!(engine.cached_len(&changelogs).unwrap(), 1);

        // `<` is only accepted on timestamp fields
        let run = executor
            .execute(Query::delete(MatchBy::Filters(vec![Filter::before("version", "9")])))
            .unwrap()
            .into_run();
        assert_eq!(run.changes, 0);
    }

    #[test]
    fn test_lookup_rejects_path_keys() {
        let (_dir, engine, catalog) = create_test_engine();
        let tasks = catalog.get("tasks").unwrap();
        let executor = Executor::new(&engine, &tasks);

        let result = executor.execute(Query::lookup("../settings/motd")).unwrap();
        assert_eq!(result, QueryResult::Record(None));
    }
}
