//! Entity type catalog for FileDB
//!
//! The set of entity types is declared once, before the store opens, and
//! never changes while it runs.

use indexmap::IndexMap;
use serde_json::json;
use std::sync::Arc;

use super::schema::EntityType;
use crate::error::{Error, Result};

/// Registry of every entity type the store knows about
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: IndexMap<String, Arc<EntityType>>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type
    pub fn register(&mut self, entity: EntityType) -> Result<Arc<EntityType>> {
        if self.entities.contains_key(entity.name()) {
            return Err(Error::EntityAlreadyExists(entity.name().to_string()));
        }
        let entity = Arc::new(entity);
        self.entities
            .insert(entity.name().to_string(), entity.clone());
        Ok(entity)
    }

    /// Chainable form of [`Catalog::register`]
    pub fn with(mut self, entity: EntityType) -> Result<Self> {
        self.register(entity)?;
        Ok(self)
    }

    /// Get an entity type by name
    pub fn get(&self, name: &str) -> Result<Arc<EntityType>> {
        self.lookup(name)
            .ok_or_else(|| Error::EntityNotFound(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<EntityType>> {
        self.entities.get(name).cloned()
    }

    /// Entity type names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity type description as a formatted string (for .schema command)
    pub fn describe(&self, name: &str) -> Result<String> {
        let entity = self.get(name)?;
        let mut info = format!("Entity: {}\n", entity.name());
        info.push_str(&format!("Key: {}\n", entity.key()));
        info.push_str("Fields:\n");

        for field in entity.fields() {
            let mut flags = Vec::new();
            if entity.key().is_key_field(&field.name) {
                flags.push("KEY".to_string());
            }
            if entity.is_filterable(&field.name) {
                flags.push("FILTER".to_string());
            }
            if entity.is_sortable(&field.name) {
                flags.push("SORT".to_string());
            }
            if field.timestamp {
                flags.push("TIMESTAMP".to_string());
            }
            flags.push(format!("DEFAULT {}", field.default));

            info.push_str(&format!("  {} [{}]\n", field.name, flags.join(", ")));
        }

        if !entity.count_shapes().is_empty() {
            info.push_str("Counts:\n");
            for shape in entity.count_shapes() {
                info.push_str(&format!("  ({})\n", shape.join(", ")));
            }
        }

        Ok(info)
    }
}

/// Entity types used by the community bot: task tracking with ordered
/// stages, staff-only tasks, issue reports, changelog entries and
/// key/value settings.
pub fn bot_catalog() -> Result<Catalog> {
    Catalog::new()
        .with(
            EntityType::builder("tasks")
                .field("name")
                .field("description")
                .field("created_by")
                .field("channel_id")
                .field("message_id")
                .field_default("status", json!("active"))
                .created_at("created_at")
                .timestamp("completed_at")
                .filterable(&["status", "created_by", "channel_id"])
                .sortable(&["created_at", "name"])
                .build(),
        )?
        .with(
            EntityType::builder("stages")
                .composite_key("task_id", "idx")
                .field("name")
                .field("description")
                .field("assignee_id")
                .field_default("done", json!(0))
                .created_at("created_at")
                .timestamp("completed_at")
                .filterable(&["done", "assignee_id"])
                .sortable(&["idx"])
                .count_shape(&["task_id", "done"])
                .build(),
        )?
        .with(
            EntityType::builder("admin_tasks")
                .field("title")
                .field("description")
                .field("assignee_id")
                .field("created_by")
                .field_default("status", json!("open"))
                .field_default("priority", json!("normal"))
                .timestamp("due_at")
                .created_at("created_at")
                .filterable(&["status", "assignee_id", "created_by"])
                .sortable(&["created_at", "due_at"])
                .count_shape(&["assignee_id", "status"])
                .build(),
        )?
        .with(
            EntityType::builder("issues")
                .field("title")
                .field("description")
                .field("reporter_id")
                .field("message_id")
                .field_default("severity", json!("normal"))
                .field_default("status", json!("open"))
                .created_at("created_at")
                .filterable(&["status", "reporter_id", "severity", "message_id"])
                .sortable(&["created_at"])
                .build(),
        )?
        .with(
            EntityType::builder("changelogs")
                .field("version")
                .field("title")
                .field("content")
                .field("author_id")
                .created_at("created_at")
                .filterable(&["version", "author_id"])
                .sortable(&["created_at", "version"])
                .build(),
        )?
        .with(
            EntityType::builder("settings")
                .explicit_key("key")
                .field("value")
                .created_at("updated_at")
                .sortable(&["key"])
                .build(),
        )
}
