//! Migration utilities for converting between storage backends
//!
//! This module provides functions to migrate data between YAML and SQLite backends,
//! as well as import/export to JSON format for interoperability.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::models::FamilyData;
use crate::store::validate;
use super::traits::{DatabaseStats, PersistenceBackend};
use super::{SqliteBackend, YamlBackend};

/// Copies every tree and person from one backend into another,
/// replacing whatever the destination held
pub fn migrate(
    source: &dyn PersistenceBackend,
    destination: &dyn PersistenceBackend,
) -> Result<DatabaseStats> {
    let data = source
        .load_all()
        .with_context(|| format!("Failed to load {} data", source.backend_type()))?;

    destination
        .save_all(&data)
        .with_context(|| format!("Failed to save to {} backend", destination.backend_type()))?;

    info!(
        "Migrated {} trees and {} persons from {} to {}",
        data.trees.len(),
        data.persons.len(),
        source.backend_type(),
        destination.backend_type()
    );

    Ok(DatabaseStats {
        tree_count: data.trees.len(),
        person_count: data.persons.len(),
        backend_type: destination.backend_type(),
    })
}

/// Migrates data from a YAML file to a SQLite database
pub fn migrate_yaml_to_sqlite<P1: AsRef<Path>, P2: AsRef<Path>>(
    yaml_path: P1,
    sqlite_path: P2,
) -> Result<DatabaseStats> {
    let yaml_backend = YamlBackend::new(yaml_path);
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    migrate(&yaml_backend, &sqlite_backend)
}

/// Migrates data from a SQLite database to a YAML file
pub fn migrate_sqlite_to_yaml<P1: AsRef<Path>, P2: AsRef<Path>>(
    sqlite_path: P1,
    yaml_path: P2,
) -> Result<DatabaseStats> {
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    let yaml_backend = YamlBackend::new(yaml_path);
    migrate(&sqlite_backend, &yaml_backend)
}

/// Exports family data to a JSON file
pub fn export_to_json<P: AsRef<Path>>(data: &FamilyData, json_path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;

    std::fs::write(json_path, json).context("Failed to write JSON file")?;

    Ok(())
}

/// Imports family data from a JSON file
pub fn import_from_json<P: AsRef<Path>>(json_path: P) -> Result<FamilyData> {
    let json = std::fs::read_to_string(json_path).context("Failed to read JSON file")?;

    let data: FamilyData = serde_json::from_str(&json).context("Failed to parse JSON")?;

    Ok(data)
}

/// Exports data from any backend to a JSON file
pub fn export_backend_to_json<P: AsRef<Path>>(
    backend: &dyn PersistenceBackend,
    json_path: P,
) -> Result<()> {
    let data = backend.load_all()?;
    export_to_json(&data, json_path)
}

/// Imports data from a JSON file into any backend, replacing its content.
///
/// The document is checked first; a file that breaks any tree or person rule
/// is rejected and the backend is left untouched.
pub fn import_json_to_backend<P: AsRef<Path>>(
    json_path: P,
    backend: &dyn PersistenceBackend,
) -> Result<DatabaseStats> {
    let data = import_from_json(json_path)?;
    validate::family_data(&data).context("Import file is not a valid family tree")?;
    backend.save_all(&data)?;
    info!(
        "Imported {} trees and {} persons into {} backend",
        data.trees.len(),
        data.persons.len(),
        backend.backend_type()
    );
    Ok(DatabaseStats {
        tree_count: data.trees.len(),
        person_count: data.persons.len(),
        backend_type: backend.backend_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::error::ValidationError;
    use crate::models::{Person, RelativeRole, Sex, Tree};
    use tempfile::{NamedTempFile, TempDir};
    use uuid::Uuid;

    fn sample_data() -> FamilyData {
        let tree = Tree::new("usr", "Migracja");
        let person = Person {
            id: Uuid::new_v4(),
            owner_id: "usr".to_string(),
            tree_id: tree.id,
            first_name: "Jan".to_string(),
            last_name: "Kowalski".to_string(),
            sex: Sex::Male,
            birth_date: None,
            death_date: None,
            note: None,
            father_id: None,
            mother_id: None,
            partner_id: None,
        };
        FamilyData {
            trees: vec![tree],
            persons: vec![person],
        }
    }

    #[test]
    fn test_yaml_to_sqlite_migration() {
        let yaml_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let sqlite_file = NamedTempFile::with_suffix(".db").unwrap();

        let data = sample_data();
        YamlBackend::new(yaml_file.path()).save_all(&data).unwrap();

        let stats = migrate_yaml_to_sqlite(yaml_file.path(), sqlite_file.path()).unwrap();
        assert_eq!(stats.tree_count, 1);
        assert_eq!(stats.person_count, 1);

        let sqlite_backend = SqliteBackend::new(sqlite_file.path()).unwrap();
        assert_eq!(sqlite_backend.load_all().unwrap(), data);
    }

    #[test]
    fn test_sqlite_to_yaml_migration() {
        let sqlite_file = NamedTempFile::with_suffix(".db").unwrap();
        let yaml_file = NamedTempFile::with_suffix(".yaml").unwrap();

        let data = sample_data();
        SqliteBackend::new(sqlite_file.path())
            .unwrap()
            .save_all(&data)
            .unwrap();

        migrate_sqlite_to_yaml(sqlite_file.path(), yaml_file.path()).unwrap();

        assert_eq!(YamlBackend::new(yaml_file.path()).load_all().unwrap(), data);
    }

    #[test]
    fn test_json_export_import() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("export.json");

        let source = MemoryBackend::with_data(sample_data());
        export_backend_to_json(&source, &json_path).unwrap();

        let destination = MemoryBackend::new();
        let stats = import_json_to_backend(&json_path, &destination).unwrap();
        assert_eq!(stats.person_count, 1);
        assert_eq!(destination.load_all().unwrap(), source.load_all().unwrap());
    }

    #[test]
    fn test_import_rejects_broken_links_and_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("broken.json");

        let mut broken = sample_data();
        broken.trees[0].name = "T".to_string();
        let person = &mut broken.persons[0];
        person.first_name = "A".to_string();
        person.last_name = String::new();
        person.father_id = Some(Uuid::new_v4());
        person.partner_id = Some(person.id);
        export_to_json(&broken, &json_path).unwrap();

        let existing = sample_data();
        let destination = MemoryBackend::with_data(existing.clone());
        let err = import_json_to_backend(&json_path, &destination).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::TreeNameTooShort { min: 3 })
        );
        assert_eq!(destination.load_all().unwrap(), existing);
    }

    #[test]
    fn test_import_rejects_dangling_relative() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("dangling.json");

        let mut data = sample_data();
        let missing = Uuid::new_v4();
        data.persons[0].father_id = Some(missing);
        export_to_json(&data, &json_path).unwrap();

        let destination = MemoryBackend::new();
        let err = import_json_to_backend(&json_path, &destination).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::UnknownRelative {
                role: RelativeRole::Father,
                id: missing
            })
        );
        assert!(destination.load_all().unwrap().is_empty());
    }
}
