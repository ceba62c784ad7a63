//! Typed query model
//!
//! Every operation the store performs is one of these variants. Text
//! instructions are parsed and bound into a `Query`; callers that know what
//! they want can build one directly and skip the text entirely.

use serde_json::Value;
use std::cmp::Ordering;

use crate::storage::record::{PrimaryKey, Record};
use crate::storage::value::{compare, loosely_equal};

/// What an insert does when the key already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnConflict {
    /// Overwrite the existing record
    #[default]
    Replace,
    /// Keep the existing record, report no change
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    /// Strictly before; only valid on timestamp fields
    Before,
}

/// A single filter; a list of filters is a conjunction
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn before(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Before,
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => loosely_equal(actual, &self.value),
            FilterOp::Before => {
                !actual.is_null() && compare(actual, &self.value) == Some(Ordering::Less)
            }
        }
    }
}

/// Whether a record satisfies every filter
pub fn matches_all(filters: &[Filter], record: &Record) -> bool {
    filters.iter().all(|f| f.matches(record))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Stable in-place sort; incomparable values keep their relative order
    pub fn apply(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            let left = a.get(&self.field).unwrap_or(&Value::Null);
            let right = b.get(&self.field).unwrap_or(&Value::Null);
            let ordering = compare(left, right).unwrap_or(Ordering::Equal);
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }
}

/// How update and delete pick their targets
#[derive(Debug, Clone, PartialEq)]
pub enum MatchBy {
    Key(PrimaryKey),
    Filters(Vec<Filter>),
}

/// A single operation against one entity type
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    PointLookup {
        key: PrimaryKey,
    },
    FilterScan {
        filters: Vec<Filter>,
        sort: Option<SortBy>,
        limit: Option<usize>,
    },
    Count {
        filters: Vec<Filter>,
    },
    Insert {
        record: Record,
        on_conflict: OnConflict,
    },
    Update {
        target: MatchBy,
        set: Record,
    },
    Delete {
        target: MatchBy,
    },
}

impl Query {
    pub fn lookup(key: impl Into<PrimaryKey>) -> Self {
        Query::PointLookup { key: key.into() }
    }

    pub fn scan(filters: Vec<Filter>) -> Self {
        Query::FilterScan {
            filters,
            sort: None,
            limit: None,
        }
    }

    pub fn count(filters: Vec<Filter>) -> Self {
        Query::Count { filters }
    }

    pub fn insert(record: Record) -> Self {
        Query::Insert {
            record,
            on_conflict: OnConflict::Replace,
        }
    }

    pub fn insert_or_ignore(record: Record) -> Self {
        Query::Insert {
            record,
            on_conflict: OnConflict::Ignore,
        }
    }

    pub fn update(target: MatchBy, set: Record) -> Self {
        Query::Update { target, set }
    }

    pub fn delete(target: MatchBy) -> Self {
        Query::Delete { target }
    }

    /// Set the sort of a scan; no effect on other variants
    pub fn sorted(mut self, by: SortBy) -> Self {
        if let Query::FilterScan { sort, .. } = &mut self {
            *sort = Some(by);
        }
        self
    }

    /// Cap the size of a scan; no effect on other variants
    pub fn limited(mut self, n: usize) -> Self {
        if let Query::FilterScan { limit, .. } = &mut self {
            *limit = Some(n);
        }
        self
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Query::PointLookup { .. } | Query::FilterScan { .. } | Query::Count { .. }
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::PointLookup { .. } => "point lookup",
            Query::FilterScan { .. } => "filter scan",
            Query::Count { .. } => "count",
            Query::Insert { .. } => "insert",
            Query::Update { .. } => "update",
            Query::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::record_from;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let record = record_from([
            ("task_id", json!("t1")),
            ("done", json!(0)),
            ("created_at", json!("2024-03-01T00:00:00.000Z")),
        ]);

        assert!(Filter::eq("task_id", "t1").matches(&record));
        assert!(Filter::eq("done", false).matches(&record));
        assert!(!Filter::eq("task_id", "t2").matches(&record));
        assert!(Filter::eq("assignee_id", Value::Null).matches(&record));

        assert!(Filter::before("created_at", "2024-04-01T00:00:00.000Z").matches(&record));
        assert!(!Filter::before("created_at", "2024-01-01T00:00:00.000Z").matches(&record));
        assert!(!Filter::before("completed_at", "2024-04-01T00:00:00.000Z").matches(&record));
    }

    #[test]
    fn test_sort_is_stable() {
        let mut records = vec![
            record_from([("n", json!("a")), ("idx", json!(2))]),
            record_from([("n", json!("b")), ("idx", json!(1))]),
            record_from([("n", json!("c")), ("idx", json!(2))]),
        ];

        SortBy::asc("idx").apply(&mut records);
        let names: Vec<&Value> = records.iter().map(|r| &r["n"]).collect();
        assert_eq!(names, vec![&json!("b"), &json!("a"), &json!("c")]);

        SortBy::desc("idx").apply(&mut records);
        let names: Vec<&Value> = records.iter().map(|r| &r["n"]).collect();
        assert_eq!(names, vec![&json!("a"), &json!("c"), &json!("b")]);
    }

    #[test]
    fn test_builders() {
        let query = Query::scan(vec![Filter::eq("status", "open")])
            .sorted(SortBy::desc("created_at"))
            .limited(5);
        assert!(matches!(
            query,
            Query::FilterScan { sort: Some(_), limit: Some(5), .. }
        ));
        assert!(query.is_read());

        let query = Query::delete(MatchBy::Key(PrimaryKey::id("t1"))).limited(5);
        assert_eq!(query.kind(), "delete");
        assert!(!query.is_read());
    }
}
