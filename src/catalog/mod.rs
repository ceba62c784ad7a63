//! Catalog module
//!
//! This module contains the entity type declarations and their registry.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::{bot_catalog, Catalog};
pub use schema::{EntityBuilder, EntityType, FieldDef};
pub use types::{FieldDefault, KeyKind};
