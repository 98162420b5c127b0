//! In-memory storage backend
//!
//! Keeps both collections in process memory. Used by tests and by callers
//! that persist the data some other way.

use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{FamilyData, Person, Tree};
use super::traits::{BackendType, PersistenceBackend};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<FamilyData>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-filled with `data`
    pub fn with_data(data: FamilyData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    fn data(&self) -> Result<MutexGuard<'_, FamilyData>> {
        self.data
            .lock()
            .map_err(|_| anyhow!("In-memory data lock poisoned"))
    }
}

impl PersistenceBackend for MemoryBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    fn load_trees(&self) -> Result<Vec<Tree>> {
        Ok(self.data()?.trees.clone())
    }

    fn save_trees(&self, trees: &[Tree]) -> Result<()> {
        self.data()?.trees = trees.to_vec();
        Ok(())
    }

    fn load_persons(&self) -> Result<Vec<Person>> {
        Ok(self.data()?.persons.clone())
    }

    fn save_persons(&self, persons: &[Person]) -> Result<()> {
        self.data()?.persons = persons.to_vec();
        Ok(())
    }
}
