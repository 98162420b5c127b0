//! Relationship store
//!
//! Owns the tree and person collections of a persistence backend and funnels
//! every mutation through one place, so that:
//!
//! - father/mother/partner links only point at persons in the same tree,
//! - nobody is linked to themselves,
//! - choosing a partner also points the partner back,
//! - deleting a person clears every link that pointed at them.
//!
//! Each operation loads the whole collection, changes it in memory and writes
//! it back. Mutations are serialized by a store-wide lock held across the
//! whole read-modify-write.

mod index;
mod queries;
mod seed;
pub mod validate;

pub use queries::{OwnerStats, Relatives};
pub use seed::DEMO_TREE_NAME;

use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::db::{self, BackendType, MemoryBackend, PersistenceBackend};
use crate::error::{Result, StoreError};
use crate::models::{EntityKind, Person, PersonInput, Tree};
use index::PersonIndex;

pub struct RelationshipStore {
    backend: Box<dyn PersistenceBackend>,
    write_lock: Mutex<()>,
}

impl RelationshipStore {
    /// Creates a store over an already constructed backend
    pub fn new(backend: Box<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the data file at `path`, inferring the backend from its extension
    /// unless `backend_type` is given
    pub fn open(path: &Path, backend_type: Option<BackendType>) -> anyhow::Result<Self> {
        let backend = db::create_backend(path, backend_type)?;
        debug!("Opened {} backend at {:?}", backend.backend_type(), path);
        Ok(Self::new(backend))
    }

    /// A store whose data lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    pub fn backend(&self) -> &dyn PersistenceBackend {
        self.backend.as_ref()
    }

    // The guarded value is (), so a panic elsewhere leaves nothing inconsistent
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Trees
    // =========================================================================

    /// Creates and persists a tree named `name` (trimmed, at least 3 characters)
    pub fn create_tree(&self, owner_id: &str, name: &str) -> Result<Tree> {
        validate::owner_id(owner_id)?;
        let name = validate::tree_name(name).inspect_err(|e| warn!("Rejected tree: {}", e))?;

        let _guard = self.lock();
        self.insert_tree(owner_id, name)
    }

    /// Appends a tree with an already validated name; the caller holds the lock
    fn insert_tree(&self, owner_id: &str, name: String) -> Result<Tree> {
        let mut trees = self.backend.load_trees()?;
        let tree = Tree::new(owner_id, name);
        trees.push(tree.clone());
        self.backend.save_trees(&trees)?;

        info!("Created tree {} '{}' for {}", tree.id, tree.name, owner_id);
        Ok(tree)
    }

    /// All trees owned by `owner_id`, in creation order
    pub fn list_trees(&self, owner_id: &str) -> Result<Vec<Tree>> {
        let trees = self.backend.load_trees()?;
        Ok(trees.into_iter().filter(|t| t.owner_id == owner_id).collect())
    }

    /// The tree `tree_id`, only if `owner_id` owns it
    pub fn get_tree(&self, owner_id: &str, tree_id: &Uuid) -> Result<Tree> {
        self.backend
            .load_trees()?
            .into_iter()
            .find(|t| &t.id == tree_id && t.owner_id == owner_id)
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Tree,
                id: *tree_id,
            })
    }

    /// Deletes a tree together with every person in it.
    /// Returns how many persons were removed.
    pub fn delete_tree(&self, owner_id: &str, tree_id: &Uuid) -> Result<usize> {
        let _guard = self.lock();
        let mut trees = self.backend.load_trees()?;
        let Some(pos) = trees
            .iter()
            .position(|t| &t.id == tree_id && t.owner_id == owner_id)
        else {
            return Err(StoreError::NotFound {
                kind: EntityKind::Tree,
                id: *tree_id,
            });
        };

        // Persons go first so a failure never leaves persons without a tree
        let mut persons = self.backend.load_persons()?;
        let before = persons.len();
        persons.retain(|p| &p.tree_id != tree_id);
        let removed = before - persons.len();
        if removed > 0 {
            self.backend.save_persons(&persons)?;
        }

        trees.remove(pos);
        self.backend.save_trees(&trees)?;

        info!("Deleted tree {} and {} persons", tree_id, removed);
        Ok(removed)
    }

    // =========================================================================
    // Persons
    // =========================================================================

    /// All persons in one owner's tree, in insertion order
    pub fn list_persons(&self, owner_id: &str, tree_id: &Uuid) -> Result<Vec<Person>> {
        let persons = self.backend.load_persons()?;
        let index = PersonIndex::build(&persons);
        Ok(index
            .in_tree(owner_id, tree_id)
            .iter()
            .map(|&pos| persons[pos].clone())
            .collect())
    }

    /// Looks a person up by id across all trees
    pub fn get_person(&self, id: &Uuid) -> Result<Option<Person>> {
        let persons = self.backend.load_persons()?;
        debug!("Looking up person {} among {}", id, persons.len());
        Ok(persons.into_iter().find(|p| &p.id == id))
    }

    /// Creates or updates a person.
    ///
    /// An `id` naming an existing person makes this an update; the stored
    /// owner and tree are kept whatever the input says. Otherwise the person
    /// is inserted (with the given id, or a fresh one) into the input's tree,
    /// which must belong to the input's owner.
    ///
    /// Nothing is written unless every rule passes. When the saved person has
    /// a partner, that partner is pointed back at them; a partner's previous
    /// partner keeps its stale link.
    pub fn upsert_person(&self, input: PersonInput) -> Result<Person> {
        let _guard = self.lock();
        let mut persons = self.backend.load_persons()?;
        let index = PersonIndex::build(&persons);

        let existing = input.id.and_then(|id| index.position(&id));
        let (id, owner_id, tree_id) = match existing {
            Some(pos) => {
                let stored = &persons[pos];
                (stored.id, stored.owner_id.clone(), stored.tree_id)
            }
            None => {
                validate::owner_id(&input.owner_id)?;
                let tree_known = self
                    .backend
                    .load_trees()?
                    .iter()
                    .any(|t| t.id == input.tree_id && t.owner_id == input.owner_id);
                if !tree_known {
                    return Err(StoreError::NotFound {
                        kind: EntityKind::Tree,
                        id: input.tree_id,
                    });
                }
                (
                    input.id.unwrap_or_else(Uuid::new_v4),
                    input.owner_id.clone(),
                    input.tree_id,
                )
            }
        };

        let own_id = existing.map(|_| id);
        validate::person_fields(&input, own_id.as_ref())
            .inspect_err(|e| warn!("Rejected person {}: {}", id, e))?;

        let person = Person {
            id,
            owner_id,
            tree_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            sex: input.sex,
            birth_date: input.birth_date,
            death_date: input.death_date,
            note: input
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            father_id: input.father_id,
            mother_id: input.mother_id,
            partner_id: input.partner_id,
        };

        validate::relatives_in_tree(&person, &persons, &index)
            .inspect_err(|e| warn!("Rejected person {}: {}", id, e))?;

        match existing {
            Some(pos) => persons[pos] = person.clone(),
            None => persons.push(person.clone()),
        }

        if let Some(partner_pos) = person.partner_id.and_then(|pid| index.position(&pid)) {
            let partner = &mut persons[partner_pos];
            if partner.partner_id != Some(person.id) {
                debug!(
                    "Linking partner {} back to {} (was {:?})",
                    partner.id, person.id, partner.partner_id
                );
                partner.partner_id = Some(person.id);
            }
        }

        self.backend.save_persons(&persons)?;

        info!(
            "{} person {} '{}'",
            if existing.is_some() { "Updated" } else { "Added" },
            person.id,
            person.full_name()
        );
        Ok(person)
    }

    /// Deletes a person and clears every father/mother/partner link to them.
    /// Deleting an unknown id does nothing.
    pub fn delete_person(&self, id: &Uuid) -> Result<()> {
        let _guard = self.lock();
        let mut persons = self.backend.load_persons()?;

        let before = persons.len();
        persons.retain(|p| &p.id != id);
        if persons.len() == before {
            debug!("Delete of unknown person {} ignored", id);
            return Ok(());
        }

        let cleared = persons
            .iter_mut()
            .map(|p| p.clear_references_to(id))
            .filter(|changed| *changed)
            .count();

        self.backend.save_persons(&persons)?;

        info!("Deleted person {} and cleared {} links", id, cleared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::models::{RelativeRole, Sex};
    use chrono::NaiveDate;

    const OWNER: &str = "usr_1";

    fn store_with_tree() -> (RelationshipStore, Tree) {
        let store = RelationshipStore::in_memory();
        let tree = store.create_tree(OWNER, "Kowalscy").unwrap();
        (store, tree)
    }

    fn add(store: &RelationshipStore, tree: &Tree, first: &str, last: &str) -> Person {
        store
            .upsert_person(PersonInput::new(OWNER, tree.id, first, last))
            .unwrap()
    }

    #[test]
    fn test_create_tree_trims_and_validates() {
        let store = RelationshipStore::in_memory();

        let tree = store.create_tree(OWNER, "  Moje drzewo ").unwrap();
        assert_eq!(tree.name, "Moje drzewo");
        assert_eq!(tree.owner_id, OWNER);

        let err = store.create_tree(OWNER, " ab ").unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::TreeNameTooShort { min: 3 })
        );
        assert!(store.create_tree("  ", "Drzewo").is_err());
        assert_eq!(store.list_trees(OWNER).unwrap(), vec![tree]);
    }

    #[test]
    fn test_list_trees_filters_by_owner() {
        let store = RelationshipStore::in_memory();
        let first = store.create_tree(OWNER, "Pierwsze").unwrap();
        store.create_tree("someone_else", "Cudze").unwrap();
        let second = store.create_tree(OWNER, "Drugie").unwrap();

        assert_eq!(store.list_trees(OWNER).unwrap(), vec![first, second]);
        assert!(store.list_trees("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_get_tree_is_owner_scoped() {
        let (store, tree) = store_with_tree();
        assert_eq!(store.get_tree(OWNER, &tree.id).unwrap(), tree);
        assert!(matches!(
            store.get_tree("someone_else", &tree.id),
            Err(StoreError::NotFound {
                kind: EntityKind::Tree,
                ..
            })
        ));
    }

    #[test]
    fn test_upsert_generates_id_and_trims() {
        let (store, tree) = store_with_tree();
        let mut input = PersonInput::new(OWNER, tree.id, " Jan ", " Kowalski ");
        input.note = Some("   ".to_string());

        let jan = store.upsert_person(input).unwrap();
        assert_eq!(jan.first_name, "Jan");
        assert_eq!(jan.last_name, "Kowalski");
        assert_eq!(jan.note, None);
        assert_eq!(store.get_person(&jan.id).unwrap(), Some(jan));
    }

    #[test]
    fn test_upsert_into_unknown_tree_is_not_found() {
        let (store, _tree) = store_with_tree();
        let foreign_tree = store.create_tree("someone_else", "Cudze").unwrap();

        for tree_id in [Uuid::new_v4(), foreign_tree.id] {
            let err = store
                .upsert_person(PersonInput::new(OWNER, tree_id, "Jan", "Kowalski"))
                .unwrap_err();
            assert!(matches!(err, StoreError::NotFound { kind: EntityKind::Tree, .. }));
        }
        assert!(store.backend().load_persons().unwrap().is_empty());
    }

    #[test]
    fn test_update_keeps_owner_and_tree() {
        let (store, tree) = store_with_tree();
        let other_tree = store.create_tree(OWNER, "Inne drzewo").unwrap();
        let jan = add(&store, &tree, "Jan", "Kowalski");

        let mut input = PersonInput::from(&jan);
        input.owner_id = "intruder".to_string();
        input.tree_id = other_tree.id;
        input.first_name = "Janusz".to_string();

        let updated = store.upsert_person(input).unwrap();
        assert_eq!(updated.id, jan.id);
        assert_eq!(updated.owner_id, OWNER);
        assert_eq!(updated.tree_id, tree.id);
        assert_eq!(updated.first_name, "Janusz");
        assert_eq!(store.list_persons(OWNER, &tree.id).unwrap(), vec![updated]);
        assert!(store.list_persons(OWNER, &other_tree.id).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_with_caller_chosen_id_inserts() {
        let (store, tree) = store_with_tree();
        let chosen = Uuid::new_v4();
        let mut input = PersonInput::new(OWNER, tree.id, "Ewa", "Nowak");
        input.id = Some(chosen);

        let ewa = store.upsert_person(input).unwrap();
        assert_eq!(ewa.id, chosen);
    }

    #[test]
    fn test_self_reference_rejected_and_person_unchanged() {
        let (store, tree) = store_with_tree();
        let jan = add(&store, &tree, "Jan", "Kowalski");

        for role in RelativeRole::ALL {
            let mut input = PersonInput::from(&jan);
            input.first_name = "Changed".to_string();
            match role {
                RelativeRole::Father => input.father_id = Some(jan.id),
                RelativeRole::Mother => input.mother_id = Some(jan.id),
                RelativeRole::Partner => input.partner_id = Some(jan.id),
            }

            let err = store.upsert_person(input).unwrap_err();
            assert_eq!(
                err.validation(),
                Some(&ValidationError::SelfReference { role })
            );
            assert_eq!(store.get_person(&jan.id).unwrap(), Some(jan.clone()));
        }
    }

    #[test]
    fn test_partner_link_is_made_symmetric() {
        let (store, tree) = store_with_tree();
        let jan = add(&store, &tree, "Jan", "Kowalski");

        let mut input = PersonInput::new(OWNER, tree.id, "Anna", "Kowalska");
        input.partner_id = Some(jan.id);
        let anna = store.upsert_person(input).unwrap();

        assert_eq!(anna.partner_id, Some(jan.id));
        let jan = store.get_person(&jan.id).unwrap().unwrap();
        assert_eq!(jan.partner_id, Some(anna.id));
    }

    #[test]
    fn test_partner_reassignment_leaves_old_partner_pointing_back() {
        let (store, tree) = store_with_tree();
        let a = add(&store, &tree, "Adam", "Nowak");
        let b = add(&store, &tree, "Beata", "Nowak");
        let c = add(&store, &tree, "Celina", "Nowak");

        let mut input = PersonInput::from(&a);
        input.partner_id = Some(b.id);
        let a = store.upsert_person(input).unwrap();

        let mut input = PersonInput::from(&a);
        input.partner_id = Some(c.id);
        store.upsert_person(input).unwrap();

        let get = |id: &Uuid| store.get_person(id).unwrap().unwrap();
        assert_eq!(get(&a.id).partner_id, Some(c.id));
        assert_eq!(get(&c.id).partner_id, Some(a.id));
        // Known asymmetry: B is not unlinked when A picks someone else
        assert_eq!(get(&b.id).partner_id, Some(a.id));
    }

    #[test]
    fn test_relatives_must_be_in_same_tree() {
        let (store, tree) = store_with_tree();
        let other_tree = store.create_tree(OWNER, "Inne drzewo").unwrap();
        let stranger = add(&store, &other_tree, "Obcy", "Człowiek");

        let mut input = PersonInput::new(OWNER, tree.id, "Jan", "Kowalski");
        input.mother_id = Some(stranger.id);
        let err = store.upsert_person(input.clone()).unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::UnknownRelative {
                role: RelativeRole::Mother,
                id: stranger.id
            })
        );

        let ghost = Uuid::new_v4();
        input.mother_id = None;
        input.father_id = Some(ghost);
        assert!(store.upsert_person(input).is_err());
        assert!(store.list_persons(OWNER, &tree.id).unwrap().is_empty());
    }

    #[test]
    fn test_name_length() {
        let (store, tree) = store_with_tree();

        let err = store
            .upsert_person(PersonInput::new(OWNER, tree.id, "A", "Kowalski"))
            .unwrap_err();
        assert_eq!(
            err.validation(),
            Some(&ValidationError::FirstNameTooShort { min: 2 })
        );

        assert!(store
            .upsert_person(PersonInput::new(OWNER, tree.id, "Ab", "Kowalski"))
            .is_ok());
    }

    #[test]
    fn test_date_ordering() {
        let (store, tree) = store_with_tree();
        let early = NaiveDate::from_ymd_opt(1999, 1, 1);
        let late = NaiveDate::from_ymd_opt(2000, 1, 1);

        let mut input = PersonInput::new(OWNER, tree.id, "Jan", "Kowalski");
        input.birth_date = late;
        input.death_date = early;
        let err = store.upsert_person(input.clone()).unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::BirthAfterDeath { .. })
        ));
        assert!(!err.is_retryable());

        input.birth_date = early;
        input.death_date = late;
        assert!(store.upsert_person(input).is_ok());
    }

    #[test]
    fn test_delete_clears_dangling_links() {
        let (store, tree) = store_with_tree();
        let b = add(&store, &tree, "Bogdan", "Nowak");

        let mut input = PersonInput::new(OWNER, tree.id, "Adam", "Nowak");
        input.father_id = Some(b.id);
        input.partner_id = Some(b.id);
        let a = store.upsert_person(input).unwrap();

        store.delete_person(&b.id).unwrap();

        assert_eq!(store.get_person(&b.id).unwrap(), None);
        let a = store.get_person(&a.id).unwrap().unwrap();
        assert_eq!(a.father_id, None);
        assert_eq!(a.partner_id, None);
    }

    #[test]
    fn test_delete_does_not_cascade_to_children() {
        let (store, tree) = store_with_tree();
        let parent = add(&store, &tree, "Jan", "Kowalski");
        let mut input = PersonInput::new(OWNER, tree.id, "Piotr", "Kowalski");
        input.father_id = Some(parent.id);
        let child = store.upsert_person(input).unwrap();

        store.delete_person(&parent.id).unwrap();

        let remaining = store.list_persons(OWNER, &tree.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, child.id);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, tree) = store_with_tree();
        let jan = add(&store, &tree, "Jan", "Kowalski");
        let anna = add(&store, &tree, "Anna", "Kowalska");

        store.delete_person(&jan.id).unwrap();
        let after_first = store.backend().load_all().unwrap();

        store.delete_person(&jan.id).unwrap();
        assert_eq!(store.backend().load_all().unwrap(), after_first);
        assert_eq!(store.list_persons(OWNER, &tree.id).unwrap(), vec![anna]);

        // Never existed at all
        store.delete_person(&Uuid::new_v4()).unwrap();
    }

    #[test]
    fn test_delete_tree_cascades_to_its_persons() {
        let (store, tree) = store_with_tree();
        let other = store.create_tree(OWNER, "Zostaje").unwrap();
        add(&store, &tree, "Jan", "Kowalski");
        add(&store, &tree, "Anna", "Kowalska");
        let kept = add(&store, &other, "Ewa", "Nowak");

        assert_eq!(store.delete_tree(OWNER, &tree.id).unwrap(), 2);
        assert_eq!(store.list_trees(OWNER).unwrap(), vec![other.clone()]);
        assert_eq!(store.backend().load_persons().unwrap(), vec![kept]);

        assert!(matches!(
            store.delete_tree(OWNER, &tree.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_family_scenario() {
        let (store, tree) = store_with_tree();

        let mut input = PersonInput::new(OWNER, tree.id, "Jan", "Kowalski");
        input.sex = Sex::Male;
        let a = store.upsert_person(input).unwrap();

        let mut input = PersonInput::new(OWNER, tree.id, "Anna", "Kowalska");
        input.sex = Sex::Female;
        input.partner_id = Some(a.id);
        let b = store.upsert_person(input).unwrap();

        assert_eq!(
            store.get_person(&a.id).unwrap().unwrap().partner_id,
            Some(b.id)
        );

        let mut input = PersonInput::new(OWNER, tree.id, "Piotr", "Kowalski");
        input.father_id = Some(a.id);
        input.mother_id = Some(b.id);
        let c = store.upsert_person(input).unwrap();

        let persons = store.list_persons(OWNER, &tree.id).unwrap();
        let ids: Vec<Uuid> = persons.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);

        let child = &persons[2];
        assert_eq!(child.father_id, Some(a.id));
        assert_eq!(child.mother_id, Some(b.id));
    }

    #[test]
    fn test_store_over_yaml_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("genea.yaml");

        let tree_id = {
            let store = RelationshipStore::open(&path, None).unwrap();
            assert_eq!(store.backend().backend_type(), BackendType::Yaml);
            let tree = store.create_tree(OWNER, "Z pliku").unwrap();
            add(&store, &tree, "Jan", "Kowalski");
            tree.id
        };

        let reopened = RelationshipStore::open(&path, None).unwrap();
        let persons = reopened.list_persons(OWNER, &tree_id).unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].full_name(), "Jan Kowalski");
    }
}
