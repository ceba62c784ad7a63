//! Record and primary key types for FileDB
//!
//! A record is a flat (or nested) JSON object. Field order is preserved so a
//! record reads back exactly the way it was written.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// A single stored item: field name to JSON value.
pub type Record = IndexMap<String, Value>;

/// Extension on the file name of every persisted record
pub const RECORD_EXTENSION: &str = "json";

/// Primary key of a record within its entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryKey {
    /// Single-field key (`id`, or `key` for settings)
    Id(String),
    /// Owning record id plus position, e.g. a stage of a task
    Composite { parent: String, index: i64 },
}

impl PrimaryKey {
    pub fn id(id: impl Into<String>) -> Self {
        PrimaryKey::Id(id.into())
    }

    pub fn composite(parent: impl Into<String>, index: i64) -> Self {
        PrimaryKey::Composite {
            parent: parent.into(),
            index,
        }
    }

    /// File name stem this key is persisted under
    pub fn file_stem(&self) -> String {
        match self {
            PrimaryKey::Id(id) => id.clone(),
            PrimaryKey::Composite { parent, index } => format!("{}_{}", parent, index),
        }
    }

    /// Full file name, `<stem>.json`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), RECORD_EXTENSION)
    }

    /// Reject keys that cannot safely become a single file name.
    pub fn validate(&self) -> Result<()> {
        let raw = match self {
            PrimaryKey::Id(id) => id.as_str(),
            PrimaryKey::Composite { parent, .. } => parent.as_str(),
        };

        let unsafe_name = raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0']);

        if unsafe_name {
            return Err(Error::InvalidKey(raw.to_string()));
        }
        Ok(())
    }

    /// JSON form handed back to callers as `inserted_key`
    pub fn to_value(&self) -> Value {
        match self {
            PrimaryKey::Id(id) => Value::String(id.clone()),
            PrimaryKey::Composite { .. } => Value::String(self.file_stem()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Id(id) => write!(f, "{}", id),
            PrimaryKey::Composite { parent, index } => write!(f, "({}, {})", parent, index),
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(id: &str) -> Self {
        PrimaryKey::Id(id.to_string())
    }
}

impl From<String> for PrimaryKey {
    fn from(id: String) -> Self {
        PrimaryKey::Id(id)
    }
}

/// Build a record from `(field, value)` pairs
pub fn record_from<K, I>(fields: I) -> Record
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_names() {
        assert_eq!(PrimaryKey::id("t1").file_name(), "t1.json");
        assert_eq!(PrimaryKey::composite("t1", 0).file_name(), "t1_0.json");
    }

    #[test]
    fn test_composite_keys_do_not_collide() {
        let a = PrimaryKey::composite("a_1", 2);
        let b = PrimaryKey::composite("a", 12);
        assert_ne!(a, b);
        assert_ne!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            PrimaryKey::composite("t1", 10),
            PrimaryKey::composite("t1", 2),
            PrimaryKey::composite("t0", 5),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                PrimaryKey::composite("t0", 5),
                PrimaryKey::composite("t1", 2),
                PrimaryKey::composite("t1", 10),
            ]
        );
    }

    #[test]
    fn test_validate() {
        assert!(PrimaryKey::id("issue_3f9a").validate().is_ok());
        assert!(matches!(
            PrimaryKey::id("../etc").validate(),
            Err(Error::InvalidKey(_))
        ));
        assert!(PrimaryKey::id("..").validate().is_err());
        assert!(PrimaryKey::id("").validate().is_err());
        assert!(PrimaryKey::composite("a\\b", 0).validate().is_err());
    }

    #[test]
    fn test_record_from_keeps_order() {
        let record = record_from([("name", json!("Demo")), ("id", json!("t1"))]);
        let fields: Vec<&str> = record.keys().map(|k| k.as_str()).collect();
        assert_eq!(fields, vec!["name", "id"]);
    }
}
