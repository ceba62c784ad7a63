//! Store configuration
//!
//! Where records live on disk and how they are written.

use std::path::{Path, PathBuf};

/// Default data directory, relative to the working directory
pub const DEFAULT_DATA_DIR: &str = "data";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory; every entity type gets one subdirectory
    pub data_dir: PathBuf,
    /// Write record files as indented JSON
    pub pretty_json: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            pretty_json: true,
        }
    }
}

impl StoreConfig {
    /// Create a new store config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Toggle indented JSON output
    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.pretty_json = pretty;
        self
    }

    /// Directory holding the records of one entity type
    pub fn entity_dir(&self, entity: &str) -> PathBuf {
        self.data_dir.join(entity)
    }

    pub fn root(&self) -> &Path {
        &self.data_dir
    }
}
