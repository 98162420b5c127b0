//! YAML file storage backend
//!
//! This backend stores both collections in a single YAML file, using the
//! Storage implementation with file locking support.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::models::{FamilyData, Person, Tree};
use crate::storage::Storage;
use super::traits::{BackendType, PersistenceBackend};

/// YAML file backend implementation
///
/// Saving one collection rewrites the file under an exclusive lock and keeps
/// the other collection as it is on disk.
pub struct YamlBackend {
    storage: Storage,
    path: PathBuf,
}

impl YamlBackend {
    /// Creates a new YAML backend for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }
}

impl PersistenceBackend for YamlBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Yaml
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn load_trees(&self) -> Result<Vec<Tree>> {
        Ok(self.storage.load()?.trees)
    }

    fn save_trees(&self, trees: &[Tree]) -> Result<()> {
        self.storage
            .update_atomically(|data| data.trees = trees.to_vec())
            .map(|_| ())
    }

    fn load_persons(&self) -> Result<Vec<Person>> {
        Ok(self.storage.load()?.persons)
    }

    fn save_persons(&self, persons: &[Person]) -> Result<()> {
        self.storage
            .update_atomically(|data| data.persons = persons.to_vec())
            .map(|_| ())
    }

    fn load_all(&self) -> Result<FamilyData> {
        self.storage.load()
    }

    fn save_all(&self, data: &FamilyData) -> Result<()> {
        self.storage.save(data)
    }
}
