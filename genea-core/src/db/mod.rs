//! Persistence layer for genea family trees
//!
//! This module provides a trait-based abstraction for storage backends,
//! allowing the store to use different databases (YAML files, SQLite, memory)
//! behind one interface.

mod memory_backend;
mod migration;
mod sqlite_backend;
mod traits;
mod yaml_backend;

pub use memory_backend::MemoryBackend;
pub use migration::{
    export_backend_to_json, export_to_json, import_from_json, import_json_to_backend, migrate,
    migrate_sqlite_to_yaml, migrate_yaml_to_sqlite,
};
pub use sqlite_backend::SqliteBackend;
pub use traits::{BackendType, DatabaseStats, PersistenceBackend};
pub use yaml_backend::YamlBackend;

use anyhow::Result;
use std::path::Path;

/// Creates a backend for `path`, inferring the type from the file extension
/// unless one is given
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn PersistenceBackend>> {
    let bt = backend_type.unwrap_or_else(|| BackendType::from_path(path));

    match bt {
        BackendType::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendType::Yaml => Ok(Box::new(YamlBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
    }
}
