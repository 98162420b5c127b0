use std::collections::HashMap;
use uuid::Uuid;

use crate::models::Person;

/// Lookup index over a loaded person collection.
///
/// Positions refer to the slice the index was built from; appending to that
/// vector afterwards keeps existing positions valid.
#[derive(Debug, Default)]
pub struct PersonIndex {
    by_id: HashMap<Uuid, usize>,
    by_scope: HashMap<(String, Uuid), Vec<usize>>,
}

impl PersonIndex {
    pub fn build(persons: &[Person]) -> Self {
        let mut index = Self::default();
        for (pos, person) in persons.iter().enumerate() {
            index.by_id.insert(person.id, pos);
            index
                .by_scope
                .entry((person.owner_id.clone(), person.tree_id))
                .or_default()
                .push(pos);
        }
        index
    }

    /// Position of the person with `id`
    pub fn position(&self, id: &Uuid) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Positions of every person in one owner's tree, in insertion order
    pub fn in_tree(&self, owner_id: &str, tree_id: &Uuid) -> &[usize] {
        self.by_scope
            .get(&(owner_id.to_string(), *tree_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
