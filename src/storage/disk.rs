//! Record store for FileDB
//!
//! This module handles direct file I/O: one directory per entity type, one
//! JSON file per record, named after the record's primary key.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::catalog::{Catalog, EntityType};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::storage::record::{PrimaryKey, Record, RECORD_EXTENSION};

/// Suffix of the scratch file a record is written to before the rename
const TEMP_SUFFIX: &str = "tmp";

/// Per-record file persistence
#[derive(Debug)]
pub struct RecordStore {
    /// Directory containing one subdirectory per entity type
    root: PathBuf,
    /// Write indented JSON
    pretty: bool,
}

impl RecordStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            pretty: config.pretty_json,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_dir(&self, entity: &EntityType) -> PathBuf {
        self.root.join(entity.name())
    }

    /// Create the directory of every known entity type. Run once at startup;
    /// any failure here is a configuration error.
    pub fn create_dirs(&self, catalog: &Catalog) -> Result<()> {
        for entity in catalog.iter() {
            let dir = self.entity_dir(entity);
            fs::create_dir_all(&dir)?;
            debug!(entity = entity.name(), dir = %dir.display(), "entity directory ready");
        }
        Ok(())
    }

    /// Read every record of an entity type, ordered by primary key.
    ///
    /// Files that cannot be read or parsed are logged and skipped.
    pub fn load(&self, entity: &EntityType) -> Result<Vec<(PrimaryKey, Record)>> {
        let dir = self.require_dir(entity)?;
        let mut records = BTreeMap::new();

        for entry in fs::read_dir(&dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(entity = entity.name(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !is_record_file(&path) {
                continue;
            }

            let record = match read_record(&path) {
                Ok(record) => record,
                Err(e) => {
                    warn!(entity = entity.name(), error = %e, "skipping corrupted record");
                    continue;
                }
            };

            let Some(key) = entity.key_of(&record) else {
                warn!(
                    entity = entity.name(),
                    path = %path.display(),
                    "skipping record without a primary key"
                );
                continue;
            };

            if path.file_name().and_then(|n| n.to_str()) != Some(key.file_name().as_str()) {
                warn!(
                    entity = entity.name(),
                    path = %path.display(),
                    key = %key,
                    "record file name does not match its key"
                );
            }
            records.insert(key, record);
        }

        Ok(records.into_iter().collect())
    }

    /// Read a single record. A corrupted file reads as absent.
    pub fn read(&self, entity: &EntityType, key: &PrimaryKey) -> Result<Option<Record>> {
        key.validate()?;
        let path = self.require_dir(entity)?.join(key.file_name());

        match read_record(&path) {
            Ok(record) => Ok(Some(record)),
            Err(Error::IoError(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(entity = entity.name(), key = %key, error = %e, "treating corrupted record as absent");
                Ok(None)
            }
        }
    }

    /// Persist a record under its key, replacing any previous file.
    ///
    /// The record is written to a scratch file first and renamed into
    /// place, so readers never observe a half-written record.
    pub fn write(&self, entity: &EntityType, key: &PrimaryKey, record: &Record) -> Result<()> {
        key.validate()?;
        let dir = self.require_dir(entity)?;
        let path = dir.join(key.file_name());
        let scratch = dir.join(format!("{}.{}", key.file_name(), TEMP_SUFFIX));

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(record)?
        } else {
            serde_json::to_vec(record)?
        };

        fs::write(&scratch, bytes)?;
        if let Err(e) = fs::rename(&scratch, &path) {
            let _ = fs::remove_file(&scratch);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove the file for a key. Returns whether a file was removed.
    pub fn remove(&self, entity: &EntityType, key: &PrimaryKey) -> Result<bool> {
        key.validate()?;
        let path = self.require_dir(entity)?.join(key.file_name());

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn require_dir(&self, entity: &EntityType) -> Result<PathBuf> {
        let dir = self.entity_dir(entity);
        if !dir.is_dir() {
            return Err(Error::MissingDirectory(dir));
        }
        Ok(dir)
    }
}

fn is_record_file(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

fn read_record(path: &Path) -> Result<Record> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::CorruptedRecord {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
