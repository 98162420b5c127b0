//! Field and reference rules applied before any write

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{EntityKind, FamilyData, Person, PersonInput, RelativeRole};
use super::index::PersonIndex;

pub const MIN_TREE_NAME_LEN: usize = 3;
pub const MIN_PERSON_NAME_LEN: usize = 2;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Trims and checks a tree name
pub fn tree_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if char_len(name) < MIN_TREE_NAME_LEN {
        return Err(ValidationError::TreeNameTooShort {
            min: MIN_TREE_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

pub fn owner_id(owner_id: &str) -> Result<(), ValidationError> {
    if owner_id.trim().is_empty() {
        return Err(ValidationError::MissingOwner);
    }
    Ok(())
}

/// Field rules, checked in order: names, dates, self-reference.
///
/// `existing_id` is the id of the person being updated, `None` for an insert.
pub fn person_fields(input: &PersonInput, existing_id: Option<&Uuid>) -> Result<(), ValidationError> {
    if char_len(input.first_name.trim()) < MIN_PERSON_NAME_LEN {
        return Err(ValidationError::FirstNameTooShort {
            min: MIN_PERSON_NAME_LEN,
        });
    }
    if char_len(input.last_name.trim()) < MIN_PERSON_NAME_LEN {
        return Err(ValidationError::LastNameTooShort {
            min: MIN_PERSON_NAME_LEN,
        });
    }

    if let (Some(birth), Some(death)) = (input.birth_date, input.death_date) {
        if birth > death {
            return Err(ValidationError::BirthAfterDeath { birth, death });
        }
    }

    if let Some(own_id) = existing_id {
        for role in RelativeRole::ALL {
            if input.relative(role).as_ref() == Some(own_id) {
                return Err(ValidationError::SelfReference { role });
            }
        }
    }

    Ok(())
}

/// Every link on `person` must resolve to someone else in the same tree
pub fn relatives_in_tree(
    person: &Person,
    persons: &[Person],
    index: &PersonIndex,
) -> Result<(), ValidationError> {
    for role in RelativeRole::ALL {
        let Some(id) = person.relative(role) else {
            continue;
        };
        let same_tree = index
            .position(&id)
            .map(|pos| &persons[pos])
            .is_some_and(|relative| {
                relative.id != person.id
                    && relative.tree_id == person.tree_id
                    && relative.owner_id == person.owner_id
            });
        if !same_tree {
            return Err(ValidationError::UnknownRelative { role, id });
        }
    }
    Ok(())
}

/// Checks a whole document before it replaces the stored data.
///
/// Every tree and person must pass the same rules a single write does, and
/// every person must sit in a tree of its owner. Partner links are not
/// required to be mutual: re-partnering leaves the old partner's link in place.
pub fn family_data(data: &FamilyData) -> Result<(), ValidationError> {
    let mut tree_owners = HashMap::new();
    for tree in &data.trees {
        owner_id(&tree.owner_id)?;
        tree_name(&tree.name)?;
        if tree_owners.insert(tree.id, tree.owner_id.as_str()).is_some() {
            return Err(ValidationError::DuplicateId {
                kind: EntityKind::Tree,
                id: tree.id,
            });
        }
    }

    let mut person_ids = HashSet::new();
    for person in &data.persons {
        if !person_ids.insert(person.id) {
            return Err(ValidationError::DuplicateId {
                kind: EntityKind::Person,
                id: person.id,
            });
        }
    }

    let index = PersonIndex::build(&data.persons);
    for person in &data.persons {
        if tree_owners.get(&person.tree_id) != Some(&person.owner_id.as_str()) {
            return Err(ValidationError::UnknownTree {
                id: person.id,
                tree_id: person.tree_id,
            });
        }
        person_fields(&PersonInput::from(person), Some(&person.id))?;
        relatives_in_tree(person, &data.persons, &index)?;
    }

    Ok(())
}
