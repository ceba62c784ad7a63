//! Write-through storage engine
//!
//! Pairs the on-disk record store with the table cache. Every save and
//! delete changes both under one lock, so no caller can observe the file
//! and its cached copy disagreeing.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::cache::TableCache;
use super::disk::RecordStore;
use super::record::{PrimaryKey, Record};
use crate::catalog::{Catalog, EntityType};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct StorageEngine {
    store: RecordStore,
    cache: Mutex<TableCache>,
}

impl StorageEngine {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            store: RecordStore::new(config),
            cache: Mutex::new(TableCache::new()),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Create every entity directory and warm the cache from disk
    pub fn open(&self, catalog: &Catalog) -> Result<()> {
        self.store.create_dirs(catalog)?;
        for entity in catalog.iter() {
            let count = self.reload(entity)?;
            info!(entity = entity.name(), records = count, "loaded entity type");
        }
        Ok(())
    }

    /// Re-read one entity type from disk into the cache
    pub fn reload(&self, entity: &EntityType) -> Result<usize> {
        let mut cache = self.lock_cache()?;
        let records = self.store.load(entity)?;
        let count = records.len();
        cache.replace(entity.name(), records);
        Ok(count)
    }

    /// Point lookup. Served from the cache, falling back to the file.
    pub fn get(&self, entity: &EntityType, key: &PrimaryKey) -> Result<Option<Record>> {
        let mut cache = self.lock_cache()?;
        if let Some(record) = cache.get(entity.name(), key) {
            return Ok(Some(record.clone()));
        }

        let record = self.store.read(entity, key)?;
        if let Some(record) = &record {
            cache.put(entity.name(), key.clone(), record.clone());
        }
        Ok(record)
    }

    /// Full-table read, straight from disk. Refreshes the cache as a side effect.
    pub fn scan(&self, entity: &EntityType) -> Result<Vec<(PrimaryKey, Record)>> {
        let mut cache = self.lock_cache()?;
        let records = self.store.load(entity)?;
        cache.replace(entity.name(), records.iter().cloned());
        Ok(records)
    }

    /// Persist a record, assigning a key if it has none. Returns the key
    /// and the record exactly as stored.
    pub fn save(&self, entity: &EntityType, mut record: Record) -> Result<(PrimaryKey, Record)> {
        let key = entity.assign_key(&mut record)?;

        let mut cache = self.lock_cache()?;
        self.store.write(entity, &key, &record)?;
        cache.put(entity.name(), key.clone(), record.clone());

        debug!(entity = entity.name(), key = %key, "record saved");
        Ok((key, record))
    }

    /// Like `save`, but leaves an existing record alone. Returns `None`
    /// when the key was already taken.
    pub fn save_if_absent(
        &self,
        entity: &EntityType,
        mut record: Record,
    ) -> Result<Option<(PrimaryKey, Record)>> {
        let key = entity.assign_key(&mut record)?;

        let mut cache = self.lock_cache()?;
        if cache.get(entity.name(), &key).is_some() || self.store.read(entity, &key)?.is_some() {
            debug!(entity = entity.name(), key = %key, "record exists, insert ignored");
            return Ok(None);
        }
        self.store.write(entity, &key, &record)?;
        cache.put(entity.name(), key.clone(), record.clone());

        debug!(entity = entity.name(), key = %key, "record saved");
        Ok(Some((key, record)))
    }

    /// Remove a record. Returns whether a file was removed.
    pub fn delete(&self, entity: &EntityType, key: &PrimaryKey) -> Result<bool> {
        let mut cache = self.lock_cache()?;
        let removed = self.store.remove(entity, key)?;
        cache.remove(entity.name(), key);

        if removed {
            debug!(entity = entity.name(), key = %key, "record deleted");
        }
        Ok(removed)
    }

    /// Merge `set` into the record stored under `key`. Returns whether a
    /// record was there to update.
    pub fn update_key(&self, entity: &EntityType, key: &PrimaryKey, set: &Record) -> Result<bool> {
        let mut cache = self.lock_cache()?;
        let found = match cache.get(entity.name(), key) {
            Some(record) => Some(record.clone()),
            None => self.store.read(entity, key)?,
        };

        match found {
            Some(record) => {
                self.write_merged(&mut cache, entity, key.clone(), record, set)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Merge `set` into the first record, in key order, that `select`
    /// accepts. Finding and writing share one lock, so concurrent callers
    /// never pick the same record. Returns the updated record's key.
    pub fn update_first<F>(
        &self,
        entity: &EntityType,
        select: F,
        set: &Record,
    ) -> Result<Option<PrimaryKey>>
    where
        F: Fn(&Record) -> bool,
    {
        let mut cache = self.lock_cache()?;
        let records = self.store.load(entity)?;
        cache.replace(entity.name(), records.iter().cloned());

        match records.into_iter().find(|(_, record)| select(record)) {
            Some((key, record)) => {
                self.write_merged(&mut cache, entity, key.clone(), record, set)?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    /// Number of cached records for an entity type
    pub fn cached_len(&self, entity: &EntityType) -> Result<usize> {
        Ok(self.lock_cache()?.len(entity.name()))
    }

    /// Snapshot of the cached records for an entity type
    pub fn cached_records(&self, entity: &EntityType) -> Result<Vec<(PrimaryKey, Record)>> {
        Ok(self.lock_cache()?.records(entity.name()))
    }

    fn write_merged(
        &self,
        cache: &mut TableCache,
        entity: &EntityType,
        key: PrimaryKey,
        mut record: Record,
        set: &Record,
    ) -> Result<()> {
        for (field, value) in set {
            record.insert(field.clone(), value.clone());
        }
        self.store.write(entity, &key, &record)?;
        debug!(entity = entity.name(), key = %key, "record updated");
        cache.put(entity.name(), key, record);
        Ok(())
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, TableCache>> {
        self.cache
            .lock()
            .map_err(|_| Error::Internal("table cache lock poisoned".to_string()))
    }
}
