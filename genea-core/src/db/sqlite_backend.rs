//! SQLite database storage backend
//!
//! This backend stores trees and persons in a SQLite database file, one
//! table per collection.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{EntityKind, Person, Sex, Tree, DATE_FORMAT};
use super::traits::{BackendType, PersistenceBackend};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Raw person row as stored, before parsing ids and dates
type PersonRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Creates a new SQLite backend
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database {:?}", path))?;

        // WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        // A fresh database has no schema_version table yet
        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version < SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is outdated, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    fn parse_uuid(value: &str, kind: EntityKind) -> Result<Uuid> {
        Uuid::parse_str(value).with_context(|| format!("Invalid {} id in database: {}", kind, value))
    }

    fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>> {
        value
            .filter(|v| !v.is_empty())
            .map(|v| Self::parse_uuid(&v, EntityKind::Person))
            .transpose()
    }

    fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>> {
        value
            .filter(|v| !v.is_empty())
            .map(|v| {
                NaiveDate::parse_from_str(&v, DATE_FORMAT)
                    .with_context(|| format!("Invalid date in database: {}", v))
            })
            .transpose()
    }

    fn date_to_str(date: Option<NaiveDate>) -> Option<String> {
        date.map(|d| d.format(DATE_FORMAT).to_string())
    }

    fn person_from_row(row: PersonRow) -> Result<Person> {
        let (
            id,
            owner_id,
            tree_id,
            first_name,
            last_name,
            sex,
            birth_date,
            death_date,
            note,
            father_id,
            mother_id,
            partner_id,
        ) = row;

        Ok(Person {
            id: Self::parse_uuid(&id, EntityKind::Person)?,
            owner_id,
            tree_id: Self::parse_uuid(&tree_id, EntityKind::Tree)?,
            first_name,
            last_name,
            sex: Sex::from_code(&sex),
            birth_date: Self::parse_date(birth_date)?,
            death_date: Self::parse_date(death_date)?,
            note,
            father_id: Self::parse_optional_uuid(father_id)?,
            mother_id: Self::parse_optional_uuid(mother_id)?,
            partner_id: Self::parse_optional_uuid(partner_id)?,
        })
    }
}

impl PersistenceBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn load_trees(&self) -> Result<Vec<Tree>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, owner_id, name, created_at FROM trees ORDER BY seq")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut trees = Vec::new();
        for row in rows {
            let (id, owner_id, name, created_at) = row?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .with_context(|| format!("Invalid tree timestamp in database: {}", created_at))?
                .with_timezone(&Utc);
            trees.push(Tree {
                id: Self::parse_uuid(&id, EntityKind::Tree)?,
                owner_id,
                name,
                created_at,
            });
        }
        Ok(trees)
    }

    fn save_trees(&self, trees: &[Tree]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM trees", [])?;
        for tree in trees {
            tx.execute(
                "INSERT INTO trees (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    tree.id.to_string(),
                    tree.owner_id,
                    tree.name,
                    tree.created_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_persons(&self) -> Result<Vec<Person>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, tree_id, first_name, last_name, sex, birth_date, death_date,
                    note, father_id, mother_id, partner_id
             FROM persons ORDER BY seq",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
                row.get(10)?,
                row.get(11)?,
            ))
        })?;

        let mut persons = Vec::new();
        for row in rows {
            persons.push(Self::person_from_row(row?)?);
        }
        Ok(persons)
    }

    fn save_persons(&self, persons: &[Person]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM persons", [])?;
        for person in persons {
            tx.execute(
                "INSERT INTO persons
                 (id, owner_id, tree_id, first_name, last_name, sex, birth_date, death_date,
                  note, father_id, mother_id, partner_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    person.id.to_string(),
                    person.owner_id,
                    person.tree_id.to_string(),
                    person.first_name,
                    person.last_name,
                    person.sex.code(),
                    Self::date_to_str(person.birth_date),
                    Self::date_to_str(person.death_date),
                    person.note,
                    person.father_id.map(|id| id.to_string()),
                    person.mother_id.map(|id| id.to_string()),
                    person.partner_id.map(|id| id.to_string()),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Counting without materialising every row

    fn count(&self, kind: EntityKind) -> Result<usize> {
        let conn = self.conn()?;
        let sql = match kind {
            EntityKind::Tree => "SELECT COUNT(*) FROM trees",
            EntityKind::Person => "SELECT COUNT(*) FROM persons",
        };
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn person(tree: &Tree, first: &str, last: &str) -> Person {
        Person {
            id: Uuid::new_v4(),
            owner_id: tree.owner_id.clone(),
            tree_id: tree.id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            sex: Sex::Female,
            birth_date: NaiveDate::from_ymd_opt(1972, 9, 3),
            death_date: None,
            note: Some("Notatka".to_string()),
            father_id: None,
            mother_id: None,
            partner_id: None,
        }
    }

    #[test]
    fn test_sqlite_backend_create_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        assert!(backend.load_trees().unwrap().is_empty());
        assert!(backend.load_persons().unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_backend_keeps_order_and_links() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let tree = Tree::new("usr", "Kowalscy");
        backend.save_trees(&[tree.clone()]).unwrap();

        let mut anna = person(&tree, "Anna", "Kowalska");
        let mut jan = person(&tree, "Jan", "Kowalski");
        jan.sex = Sex::Male;
        jan.partner_id = Some(anna.id);
        anna.partner_id = Some(jan.id);
        let mut piotr = person(&tree, "Piotr", "Kowalski");
        piotr.father_id = Some(jan.id);
        piotr.mother_id = Some(anna.id);
        piotr.note = None;

        let persons = vec![piotr, anna, jan];
        backend.save_persons(&persons).unwrap();

        assert_eq!(backend.load_persons().unwrap(), persons);
        assert_eq!(backend.load_trees().unwrap(), vec![tree]);
        assert_eq!(backend.count(EntityKind::Person).unwrap(), 3);
    }

    #[test]
    fn test_sqlite_backend_reopen_keeps_data() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let tree = Tree::new("usr", "Zielińscy");
        {
            let backend = SqliteBackend::new(temp_file.path()).unwrap();
            backend.save_trees(&[tree.clone()]).unwrap();
        }

        // Schema must not be re-created on the second open
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        assert_eq!(backend.load_trees().unwrap(), vec![tree]);
        assert_eq!(backend.stats().unwrap().tree_count, 1);
    }

    #[test]
    fn test_sqlite_backend_save_replaces_rows() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        let tree = Tree::new("usr", "Lewandowscy");

        let first = person(&tree, "Maria", "Lewandowska");
        let second = person(&tree, "Marek", "Lewandowski");
        backend.save_persons(&[first.clone(), second.clone()]).unwrap();
        backend.save_persons(&[second.clone()]).unwrap();

        assert_eq!(backend.load_persons().unwrap(), vec![second]);
    }
}
