//! FileDB - an embedded file-per-record document store
//!
//! This library provides the pieces of a small persistence layer that
//! answers prepared-statement style queries over JSON records:
//! - Entity type declarations (catalog)
//! - Storage (one JSON file per record, write-through table cache)
//! - Instruction parsing and table routing
//! - Typed queries and their execution
//! - The `Database` handle tying it together

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod sql;
pub mod storage;

pub use config::StoreConfig;
pub use database::{Database, TableStats};
pub use error::{Error, Result};
pub use executor::{Filter, MatchBy, Query, RunResult, SortBy, Statement, TableHandle};
pub use storage::{PrimaryKey, Record};
