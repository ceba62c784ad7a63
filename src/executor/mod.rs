//! Query execution module
//!
//! This module contains the typed query model, the planner that binds
//! instruction templates into queries, the executor and the
//! prepared-statement façade.

pub mod executor;
pub mod planner;
pub mod query;
pub mod statement;

pub use executor::{Executor, QueryResult, RunResult};
pub use planner::Planner;
pub use query::{Filter, FilterOp, MatchBy, OnConflict, Query, SortBy, SortDirection};
pub use statement::{Statement, TableHandle};
