use chrono::NaiveDate;
use log::info;

use crate::error::Result;
use crate::models::{PersonInput, Sex, Tree};
use super::{validate, RelationshipStore};

pub const DEMO_TREE_NAME: &str = "Moje drzewo (demo)";

impl RelationshipStore {
    /// Gives a new owner something to look at: when `owner_id` has no trees
    /// yet, creates a demo tree with a couple and their son.
    ///
    /// Returns the demo tree, or `None` if the owner already had trees.
    pub fn seed_demo_if_empty(&self, owner_id: &str) -> Result<Option<Tree>> {
        validate::owner_id(owner_id)?;

        // Checking and creating under one lock keeps concurrent seeds from
        // each adding a demo tree
        let tree = {
            let _guard = self.lock();
            let trees = self.backend.load_trees()?;
            if trees.iter().any(|t| t.owner_id == owner_id) {
                return Ok(None);
            }
            self.insert_tree(owner_id, DEMO_TREE_NAME.to_string())?
        };

        let mut jan = PersonInput::new(owner_id, tree.id, "Jan", "Kowalski");
        jan.sex = Sex::Male;
        jan.birth_date = NaiveDate::from_ymd_opt(1970, 4, 12);
        let jan = self.upsert_person(jan)?;

        // Choosing Jan as partner links him back to Anna
        let mut anna = PersonInput::new(owner_id, tree.id, "Anna", "Kowalska");
        anna.sex = Sex::Female;
        anna.birth_date = NaiveDate::from_ymd_opt(1972, 9, 3);
        anna.partner_id = Some(jan.id);
        let anna = self.upsert_person(anna)?;

        let mut piotr = PersonInput::new(owner_id, tree.id, "Piotr", "Kowalski");
        piotr.sex = Sex::Male;
        piotr.birth_date = NaiveDate::from_ymd_opt(1999, 1, 15);
        piotr.note = Some("Syn Jana i Anny".to_string());
        piotr.father_id = Some(jan.id);
        piotr.mother_id = Some(anna.id);
        self.upsert_person(piotr)?;

        info!("Seeded demo tree {} for {}", tree.id, owner_id);
        Ok(Some(tree))
    }
}
