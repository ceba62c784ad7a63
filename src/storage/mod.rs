//! Storage engine module
//!
//! This module contains the storage components:
//! - Record and primary key types
//! - Loose value comparison
//! - File-per-record store
//! - Table cache
//! - Write-through engine tying the two together

pub mod cache;
pub mod disk;
pub mod engine;
pub mod record;
pub mod value;

pub use cache::TableCache;
pub use disk::RecordStore;
pub use engine::StorageEngine;
pub use record::{record_from, PrimaryKey, Record};
pub use serde_json::Value;
