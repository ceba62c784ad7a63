//! Prepared statements
//!
//! A `Statement` is an instruction prepared against the store, answered
//! through `get`, `all` and `run` with positional parameters. Statements
//! that target no known entity type, or whose text is not a recognized
//! shape, are no-ops: reads come back empty and mutations change nothing.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::executor::{Executor, QueryResult, RunResult};
use super::planner::Planner;
use super::query::{Filter, Query};
use crate::catalog::EntityType;
use crate::error::Result;
use crate::sql::parser::DEFAULT_COUNT_ALIAS;
use crate::sql::Template;
use crate::storage::{PrimaryKey, Record, StorageEngine};

enum Target<'db> {
    /// Unknown entity type or unparseable text
    NoOp,
    /// Schema declaration, acknowledged and ignored
    Schema,
    Table {
        engine: &'db StorageEngine,
        entity: Arc<EntityType>,
        template: Template,
    },
}

/// An instruction prepared against a database
pub struct Statement<'db> {
    sql: String,
    target: Target<'db>,
}

impl<'db> Statement<'db> {
    pub(crate) fn bound(
        sql: &str,
        engine: &'db StorageEngine,
        entity: Arc<EntityType>,
        template: Template,
    ) -> Self {
        Self {
            sql: sql.to_string(),
            target: Target::Table {
                engine,
                entity,
                template,
            },
        }
    }

    pub(crate) fn schema(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            target: Target::Schema,
        }
    }

    pub(crate) fn noop(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            target: Target::NoOp,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Entity type the statement targets, if any
    pub fn table(&self) -> Option<&str> {
        match &self.target {
            Target::Table { entity, .. } => Some(entity.name()),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.target, Target::NoOp)
    }

    /// First matching record, or the count as `{ alias: n }`
    pub fn get(&self, params: &[Value]) -> Result<Option<Record>> {
        if !self.reads() {
            return Ok(None);
        }
        let alias = self.count_alias();
        Ok(self.execute(params)?.into_record(alias))
    }

    /// Every matching record in result order
    pub fn all(&self, params: &[Value]) -> Result<Vec<Record>> {
        if !self.reads() {
            return Ok(Vec::new());
        }
        let alias = self.count_alias();
        Ok(self.execute(params)?.into_records(alias))
    }

    /// Perform a mutation
    pub fn run(&self, params: &[Value]) -> Result<RunResult> {
        match &self.target {
            Target::Schema => {
                debug!(sql = %self.sql, "schema declaration acknowledged");
                return Ok(RunResult::default());
            }
            Target::Table { template, .. } if template.is_read() => {
                debug!(sql = %self.sql, "run on a read instruction");
                return Ok(RunResult::default());
            }
            _ => {}
        }
        Ok(self.execute(params)?.into_run())
    }

    /// Bind the parameters and hand the query to the executor. Shapes
    /// that fail to bind yield `Run` with no changes, which every
    /// accessor reads as empty.
    fn execute(&self, params: &[Value]) -> Result<QueryResult> {
        let Target::Table {
            engine,
            entity,
            template,
        } = &self.target
        else {
            return Ok(QueryResult::Run(RunResult::default()));
        };

        match Planner::new(entity, params).plan(template) {
            Some(query) => {
                debug!(entity = entity.name(), kind = query.kind(), "executing");
                Executor::new(engine, entity).execute(query)
            }
            None => {
                warn!(
                    entity = entity.name(),
                    sql = %self.sql,
                    params = params.len(),
                    "unrecognized instruction shape"
                );
                Ok(QueryResult::Run(RunResult::default()))
            }
        }
    }

    fn reads(&self) -> bool {
        match &self.target {
            Target::Table { template, .. } => {
                if !template.is_read() {
                    debug!(sql = %self.sql, "read on a mutating instruction");
                }
                template.is_read()
            }
            _ => false,
        }
    }

    fn count_alias(&self) -> &str {
        match &self.target {
            Target::Table {
                template: Template::Select {
                    count: Some(alias), ..
                },
                ..
            } => alias.as_str(),
            _ => DEFAULT_COUNT_ALIAS,
        }
    }
}

/// Typed access to one entity type, bypassing instruction text
pub struct TableHandle<'db> {
    engine: &'db StorageEngine,
    entity: Option<Arc<EntityType>>,
}

impl<'db> TableHandle<'db> {
    pub(crate) fn new(engine: &'db StorageEngine, entity: Option<Arc<EntityType>>) -> Self {
        Self { engine, entity }
    }

    pub fn name(&self) -> Option<&str> {
        self.entity.as_deref().map(EntityType::name)
    }

    /// Whether the handle is backed by a known entity type
    pub fn exists(&self) -> bool {
        self.entity.is_some()
    }

    /// Run any query. Handles for unknown entity types answer every
    /// query with its empty result.
    pub fn execute(&self, query: Query) -> Result<QueryResult> {
        match &self.entity {
            Some(entity) => Executor::new(self.engine, entity).execute(query),
            None => {
                warn!(kind = query.kind(), "query against unknown entity type");
                Ok(QueryResult::empty(&query))
            }
        }
    }

    pub fn get(&self, key: impl Into<PrimaryKey>) -> Result<Option<Record>> {
        Ok(self
            .execute(Query::lookup(key))?
            .into_record(DEFAULT_COUNT_ALIAS))
    }

    pub fn all(&self, query: Query) -> Result<Vec<Record>> {
        Ok(self.execute(query)?.into_records(DEFAULT_COUNT_ALIAS))
    }

    pub fn count(&self, filters: Vec<Filter>) -> Result<usize> {
        Ok(self.execute(Query::count(filters))?.count().unwrap_or(0))
    }

    pub fn run(&self, query: Query) -> Result<RunResult> {
        Ok(self.execute(query)?.into_run())
    }
}
