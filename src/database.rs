//! Database handle
//!
//! `Database` owns the catalog, the storage engine and the router. It is
//! constructed once, then shared by reference (or behind an `Arc`) with
//! every caller.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{bot_catalog, Catalog, EntityType};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::executor::{Filter, MatchBy, Query, Statement, TableHandle};
use crate::sql::{parse, Router, Template};
use crate::storage::{Record, StorageEngine};

/// Record count and location of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub name: String,
    pub records: usize,
    pub dir: PathBuf,
}

/// An open store
#[derive(Debug)]
pub struct Database {
    config: StoreConfig,
    catalog: Arc<Catalog>,
    engine: StorageEngine,
    router: Router,
}

impl Database {
    /// Create every entity directory and load every entity type into the cache
    pub fn open(config: StoreConfig, catalog: Catalog) -> Result<Self> {
        let engine = StorageEngine::new(&config);
        engine.open(&catalog)?;
        let router = Router::new(&catalog);

        info!(
            data_dir = %config.root().display(),
            entity_types = catalog.len(),
            "database opened"
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            engine,
            router,
        })
    }

    /// Open a data directory with the bot's entity types
    pub fn open_default(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            StoreConfig::new().data_dir(data_dir.as_ref()),
            bot_catalog()?,
        )
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    /// Prepare an instruction. Never fails: instructions that name no known
    /// entity type, or that do not parse, become no-op statements.
    pub fn prepare(&self, sql: &str) -> Statement<'_> {
        let template = match parse(sql) {
            Ok(template) => template,
            Err(e) => {
                warn!(
                    table = self.router.route(sql).unwrap_or("?"),
                    error = %e,
                    sql,
                    "unrecognized instruction"
                );
                return Statement::noop(sql);
            }
        };

        if matches!(template, Template::Schema) {
            return Statement::schema(sql);
        }

        let entity = template
            .table()
            .and_then(|table| self.router.resolve(table))
            .and_then(|name| self.catalog.lookup(name));

        match entity {
            Some(entity) => Statement::bound(sql, &self.engine, entity, template),
            None => {
                warn!(table = template.table().unwrap_or("?"), sql, "unknown entity type");
                Statement::noop(sql)
            }
        }
    }

    /// Typed handle to one entity type; unknown names give a no-op handle
    pub fn for_table(&self, name: &str) -> TableHandle<'_> {
        let entity = self
            .router
            .resolve(name)
            .and_then(|name| self.catalog.lookup(name));
        if entity.is_none() {
            warn!(table = name, "unknown entity type");
        }
        TableHandle::new(&self.engine, entity)
    }

    /// Acknowledge a batch of schema declarations. Entity types are fixed
    /// when the database opens, so nothing is created.
    pub fn exec(&self, sql: &str) -> Result<()> {
        let statements = sql.split(';').filter(|s| !s.trim().is_empty()).count();
        debug!(statements, "schema declarations acknowledged");
        Ok(())
    }

    /// Record count and directory of every entity type, in catalog order
    pub fn stats(&self) -> Result<Vec<TableStats>> {
        self.catalog
            .iter()
            .map(|entity| {
                Ok(TableStats {
                    name: entity.name().to_string(),
                    records: self.engine.cached_len(entity)?,
                    dir: self.engine.store().entity_dir(entity),
                })
            })
            .collect()
    }

    /// Delete every record whose timestamp `field` is before `cutoff`.
    /// Returns the number of records removed.
    pub fn prune_before(&self, table: &str, field: &str, cutoff: &str) -> Result<usize> {
        let query = Query::delete(MatchBy::Filters(vec![Filter::before(field, cutoff)]));
        let removed = self.for_table(table).run(query)?.changes;
        if removed > 0 {
            info!(table, field, cutoff, removed, "pruned records");
        }
        Ok(removed)
    }

    /// Re-read one entity type from disk into the cache
    pub fn reload(&self, table: &str) -> Result<usize> {
        let entity = self.entity(table)?;
        let count = self.engine.reload(&entity)?;
        info!(table = entity.name(), records = count, "reloaded entity type");
        Ok(count)
    }

    /// Every record of an entity type read straight from disk, bypassing
    /// the cache
    pub fn load_from_disk(&self, table: &str) -> Result<Vec<Record>> {
        let entity = self.entity(table)?;
        Ok(self
            .engine
            .store()
            .load(&entity)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    fn entity(&self, table: &str) -> Result<Arc<EntityType>> {
        match self.router.resolve(table) {
            Some(name) => self.catalog.get(name),
            None => self.catalog.get(table),
        }
    }
}
