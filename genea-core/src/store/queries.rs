//! Read-only relationship lookups

use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{EntityKind, Person};
use super::index::PersonIndex;
use super::RelationshipStore;

/// A person's resolved single-generation links.
/// A link whose target no longer exists reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relatives {
    pub father: Option<Person>,
    pub mother: Option<Person>,
    pub partner: Option<Person>,
}

/// Per-owner counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerStats {
    pub trees: usize,
    pub persons: usize,
}

impl RelationshipStore {
    /// Resolves father, mother and partner of the person `id`
    pub fn relatives_of(&self, id: &Uuid) -> Result<Relatives> {
        let persons = self.backend.load_persons()?;
        let index = PersonIndex::build(&persons);

        let person = index
            .position(id)
            .map(|pos| &persons[pos])
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Person,
                id: *id,
            })?;

        let resolve = |link: Option<Uuid>| {
            link.and_then(|rid| index.position(&rid))
                .map(|pos| persons[pos].clone())
        };

        Ok(Relatives {
            father: resolve(person.father_id),
            mother: resolve(person.mother_id),
            partner: resolve(person.partner_id),
        })
    }

    /// Everyone whose father or mother is `id`
    pub fn children_of(&self, id: &Uuid) -> Result<Vec<Person>> {
        Ok(self
            .backend
            .load_persons()?
            .into_iter()
            .filter(|p| p.father_id.as_ref() == Some(id) || p.mother_id.as_ref() == Some(id))
            .collect())
    }

    /// Persons of a tree that can be picked as someone's relative;
    /// `exclude` is the person being edited, who may not pick themselves
    pub fn relative_candidates(
        &self,
        owner_id: &str,
        tree_id: &Uuid,
        exclude: Option<&Uuid>,
    ) -> Result<Vec<Person>> {
        let mut persons = self.list_persons(owner_id, tree_id)?;
        if let Some(excluded) = exclude {
            persons.retain(|p| &p.id != excluded);
        }
        Ok(persons)
    }

    pub fn owner_stats(&self, owner_id: &str) -> Result<OwnerStats> {
        let trees = self
            .backend
            .load_trees()?
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .count();
        let persons = self
            .backend
            .load_persons()?
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .count();
        Ok(OwnerStats { trees, persons })
    }
}
