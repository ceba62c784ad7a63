//! Key and default-value kinds for entity types

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

/// How the records of an entity type are keyed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// Single field; the store generates a value when the caller omits it
    Generated { field: String },
    /// Single field the caller must always supply (settings)
    Explicit { field: String },
    /// Parent id plus position index, e.g. `task_id` + `idx`
    Composite { parent: String, index: String },
}

impl KeyKind {
    /// Field names making up the key, in declaration order
    pub fn fields(&self) -> Vec<&str> {
        match self {
            KeyKind::Generated { field } | KeyKind::Explicit { field } => vec![field.as_str()],
            KeyKind::Composite { parent, index } => vec![parent.as_str(), index.as_str()],
        }
    }

    pub fn is_key_field(&self, name: &str) -> bool {
        self.fields().contains(&name)
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Generated { field } => write!(f, "{} (generated)", field),
            KeyKind::Explicit { field } => write!(f, "{} (explicit)", field),
            KeyKind::Composite { parent, index } => write!(f, "({}, {})", parent, index),
        }
    }
}

/// Value a declared field takes when an insert omits it
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Null,
    Value(Value),
    /// Insertion time, RFC 3339 UTC with milliseconds
    Now,
}

impl FieldDefault {
    pub fn resolve(&self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::Value(v) => v.clone(),
            FieldDefault::Now => Value::String(now_timestamp()),
        }
    }
}

impl fmt::Display for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Null => write!(f, "NULL"),
            FieldDefault::Value(v) => write!(f, "{}", v),
            FieldDefault::Now => write!(f, "CURRENT_TIMESTAMP"),
        }
    }
}

/// Current time in the format timestamp fields are stored in.
///
/// Lexicographic order of these strings matches chronological order, which
/// is what `ORDER BY created_at DESC` and retention cutoffs rely on.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_fields() {
        let key = KeyKind::Composite {
            parent: "task_id".to_string(),
            index: "idx".to_string(),
        };
        assert_eq!(key.fields(), vec!["task_id", "idx"]);
        assert!(key.is_key_field("idx"));
        assert!(!key.is_key_field("name"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(FieldDefault::Null.resolve(), Value::Null);
        assert_eq!(FieldDefault::Value(json!(0)).resolve(), json!(0));

        let now = FieldDefault::Now.resolve();
        let text = now.as_str().unwrap();
        assert!(text.ends_with('Z'));
        assert_eq!(text.len(), "2024-01-01T00:00:00.000Z".len());
    }
}
