//! Entity type definitions for FileDB
//!
//! An entity type is the store's notion of a table: a name, a key, the
//! declared fields, and the narrow set of filter/sort/count shapes the
//! query facade recognizes for it.

use serde_json::Value;

use super::types::{FieldDefault, KeyKind};
use crate::error::{Error, Result};
use crate::storage::record::{PrimaryKey, Record};
use crate::storage::value::{as_index, key_component};

/// Declared field of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Value used when an insert omits the field
    pub default: FieldDefault,
    /// Holds an RFC 3339 timestamp (eligible for `<` cutoffs)
    pub timestamp: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: FieldDefault::Null,
            timestamp: false,
        }
    }

    pub fn default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    pub fn timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A named category of records
#[derive(Debug, Clone)]
pub struct EntityType {
    name: String,
    key: KeyKind,
    fields: Vec<FieldDef>,
    filterable: Vec<String>,
    sortable: Vec<String>,
    /// Each shape is a sorted list of field names
    count_shapes: Vec<Vec<String>>,
}

impl EntityType {
    /// Start declaring an entity type
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &KeyKind {
        &self.key
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Key fields are always filterable
    pub fn is_filterable(&self, field: &str) -> bool {
        self.key.is_key_field(field) || self.filterable.iter().any(|f| f == field)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.iter().any(|f| f == field)
    }

    pub fn is_timestamp(&self, field: &str) -> bool {
        self.field(field).map(|f| f.timestamp).unwrap_or(false)
    }

    /// Whether a count restricted to exactly these fields is recognized:
    /// the bare count, any single filterable field, or a declared shape.
    pub fn is_count_shape(&self, fields: &[&str]) -> bool {
        let mut wanted: Vec<&str> = fields.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        match wanted.as_slice() {
            [] => return true,
            [field] if self.is_filterable(field) => return true,
            _ => {}
        }
        self.count_shapes
            .iter()
            .any(|shape| shape.iter().map(String::as_str).eq(wanted.iter().copied()))
    }

    pub fn count_shapes(&self) -> &[Vec<String>] {
        &self.count_shapes
    }

    pub fn filterable(&self) -> &[String] {
        &self.filterable
    }

    pub fn sortable(&self) -> &[String] {
        &self.sortable
    }

    /// Primary key carried by a record, if complete
    pub fn key_of(&self, record: &Record) -> Option<PrimaryKey> {
        match &self.key {
            KeyKind::Generated { field } | KeyKind::Explicit { field } => {
                record.get(field).and_then(key_component).map(PrimaryKey::Id)
            }
            KeyKind::Composite { parent, index } => {
                let parent = record.get(parent).and_then(key_component)?;
                let index = record.get(index).and_then(as_index)?;
                Some(PrimaryKey::Composite { parent, index })
            }
        }
    }

    /// Primary key addressed by a set of `field = value` equalities.
    ///
    /// Only returns a key when the equalities name exactly the key fields,
    /// nothing more and nothing less.
    pub fn key_from_equalities(&self, pairs: &[(&str, &Value)]) -> Option<PrimaryKey> {
        let key_fields = self.key.fields();
        if pairs.len() != key_fields.len() {
            return None;
        }
        let lookup = |name: &str| pairs.iter().find(|(f, _)| *f == name).map(|(_, v)| *v);

        match &self.key {
            KeyKind::Generated { field } | KeyKind::Explicit { field } => {
                lookup(field.as_str()).and_then(key_component).map(PrimaryKey::Id)
            }
            KeyKind::Composite { parent, index } => {
                let parent = lookup(parent.as_str()).and_then(key_component)?;
                let index = lookup(index.as_str()).and_then(as_index)?;
                Some(PrimaryKey::Composite { parent, index })
            }
        }
    }

    /// Make sure a record about to be inserted has a key, generating one
    /// where this entity type allows it.
    pub fn assign_key(&self, record: &mut Record) -> Result<PrimaryKey> {
        if let Some(key) = self.key_of(record) {
            key.validate()?;
            return Ok(key);
        }

        match &self.key {
            KeyKind::Generated { field } => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                let mut keyed = Record::with_capacity(record.len() + 1);
                keyed.insert(field.clone(), Value::String(id.clone()));
                keyed.extend(std::mem::take(record).into_iter().filter(|(k, _)| k != field));
                *record = keyed;
                Ok(PrimaryKey::Id(id))
            }
            KeyKind::Explicit { field } => Err(self.missing_key(field)),
            KeyKind::Composite { parent, index } => {
                let missing = if record.get(parent).and_then(key_component).is_none() {
                    parent
                } else {
                    index
                };
                Err(self.missing_key(missing))
            }
        }
    }

    /// Lay a record out in declaration order, filling omitted declared
    /// fields with their defaults. Undeclared fields follow, as given.
    pub fn apply_defaults(&self, record: Record) -> Record {
        let mut rest = record;
        let mut shaped = Record::with_capacity(self.fields.len() + rest.len());

        for field in &self.fields {
            let value = rest
                .shift_remove(&field.name)
                .unwrap_or_else(|| field.default.resolve());
            shaped.insert(field.name.clone(), value);
        }
        shaped.extend(rest);
        shaped
    }

    fn missing_key(&self, field: &str) -> Error {
        Error::MissingPrimaryKey {
            entity: self.name.clone(),
            field: field.to_string(),
        }
    }
}

/// Builder for declaring entity types with a fluent API
pub struct EntityBuilder {
    name: String,
    key: KeyKind,
    fields: Vec<FieldDef>,
    filterable: Vec<String>,
    sortable: Vec<String>,
    count_shapes: Vec<Vec<String>>,
}

impl EntityBuilder {
    /// Start with a generated `id` key
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: KeyKind::Generated {
                field: "id".to_string(),
            },
            fields: Vec::new(),
            filterable: Vec::new(),
            sortable: Vec::new(),
            count_shapes: Vec::new(),
        }
    }

    /// Key by a single field the caller always supplies
    pub fn explicit_key(mut self, field: impl Into<String>) -> Self {
        self.key = KeyKind::Explicit {
            field: field.into(),
        };
        self
    }

    /// Key by owning id plus position
    pub fn composite_key(mut self, parent: impl Into<String>, index: impl Into<String>) -> Self {
        self.key = KeyKind::Composite {
            parent: parent.into(),
            index: index.into(),
        };
        self
    }

    /// Declare a field defaulting to NULL
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef::new(name));
        self
    }

    /// Declare a field with a literal default
    pub fn field_default(mut self, name: impl Into<String>, default: Value) -> Self {
        self.fields
            .push(FieldDef::new(name).default(FieldDefault::Value(default)));
        self
    }

    /// Declare a timestamp field stamped with the insertion time
    pub fn created_at(mut self, name: impl Into<String>) -> Self {
        self.fields.push(
            FieldDef::new(name)
                .default(FieldDefault::Now)
                .timestamp(true),
        );
        self
    }

    /// Declare a timestamp field defaulting to NULL
    pub fn timestamp(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef::new(name).timestamp(true));
        self
    }

    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn sortable(mut self, fields: &[&str]) -> Self {
        self.sortable.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn count_shape(mut self, fields: &[&str]) -> Self {
        let mut shape: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        shape.sort_unstable();
        shape.dedup();
        self.count_shapes.push(shape);
        self
    }

    pub fn build(self) -> EntityType {
        // Key fields lead the declared layout.
        let mut fields: Vec<FieldDef> = self
            .key
            .fields()
            .into_iter()
            .map(FieldDef::new)
            .collect();
        for field in self.fields {
            if !self.key.is_key_field(&field.name) {
                fields.push(field);
            }
        }

        EntityType {
            name: self.name,
            key: self.key,
            fields,
            filterable: self.filterable,
            sortable: self.sortable,
            count_shapes: self.count_shapes,
        }
    }
}
