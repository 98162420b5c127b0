//! Persistence backend traits
//!
//! This module defines the core trait that all storage backends must implement.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{EntityKind, FamilyData, Person, Tree};

/// Types of persistence backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// In-process only, nothing survives the process
    Memory,
    /// YAML file storage (single file)
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Memory => write!(f, "Memory"),
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl BackendType {
    /// Infers the backend from a data file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => BackendType::Yaml,
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
            _ => BackendType::Yaml,
        }
    }
}

/// Core trait for persistence backends
///
/// A backend stores one collection per [`EntityKind`]. Callers always read a
/// whole collection, change it in memory and write the whole collection back;
/// there are no partial writes. Missing data loads as an empty collection.
pub trait PersistenceBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the backing file, if there is one
    fn path(&self) -> Option<&Path>;

    /// Loads every tree
    fn load_trees(&self) -> Result<Vec<Tree>>;

    /// Replaces the stored trees
    fn save_trees(&self, trees: &[Tree]) -> Result<()>;

    /// Loads every person
    fn load_persons(&self) -> Result<Vec<Person>>;

    /// Replaces the stored persons
    fn save_persons(&self, persons: &[Person]) -> Result<()>;

    // =========================================================================
    // Whole data set operations (migration, import/export)
    // =========================================================================

    /// Loads both collections
    fn load_all(&self) -> Result<FamilyData> {
        Ok(FamilyData {
            trees: self.load_trees()?,
            persons: self.load_persons()?,
        })
    }

    /// Replaces both collections
    fn save_all(&self, data: &FamilyData) -> Result<()> {
        self.save_trees(&data.trees)?;
        self.save_persons(&data.persons)
    }

    /// Number of records stored for one entity kind
    fn count(&self, kind: EntityKind) -> Result<usize> {
        Ok(match kind {
            EntityKind::Tree => self.load_trees()?.len(),
            EntityKind::Person => self.load_persons()?.len(),
        })
    }

    /// Returns true if the backing file exists (always true without one)
    fn exists(&self) -> bool {
        self.path().map_or(true, |p| p.exists())
    }

    /// Returns statistics about the stored data
    fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            tree_count: self.count(EntityKind::Tree)?,
            person_count: self.count(EntityKind::Person)?,
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about a backend's content
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub tree_count: usize,
    pub person_count: usize,
    pub backend_type: BackendType,
}
