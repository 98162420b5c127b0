use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Date format used for birth and death dates (ISO 8601 calendar date)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sex of a person
///
/// Persisted with the short codes `"M"`, `"F"` and `""`; `"U"` also reads
/// as unknown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "", alias = "U")]
    Unknown,
}

impl Sex {
    /// Short storage code for the sex
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "",
        }
    }

    /// Parses a storage code, treating anything unrecognised as unknown
    pub fn from_code(code: &str) -> Self {
        match code {
            "M" => Sex::Male,
            "F" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
            Sex::Unknown => write!(f, "Unknown"),
        }
    }
}

/// The three single-generation links a person can carry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RelativeRole {
    Father,
    Mother,
    Partner,
}

impl RelativeRole {
    /// All roles, in the order they are validated
    pub const ALL: [RelativeRole; 3] = [
        RelativeRole::Father,
        RelativeRole::Mother,
        RelativeRole::Partner,
    ];
}

impl fmt::Display for RelativeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeRole::Father => write!(f, "father"),
            RelativeRole::Mother => write!(f, "mother"),
            RelativeRole::Partner => write!(f, "partner"),
        }
    }
}

/// Kinds of records the persistence backend stores, one collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Tree,
    Person,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Tree => write!(f, "Tree"),
            EntityKind::Person => write!(f, "Person"),
        }
    }
}

/// A named family tree owned by one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tree {
    /// Unique identifier for the tree
    pub id: Uuid,

    /// Account that owns the tree
    pub owner_id: String,

    /// Display name
    pub name: String,

    /// When the tree was created
    pub created_at: DateTime<Utc>,
}

impl Tree {
    /// Creates a new tree with a fresh id and the current timestamp
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A single person within a tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    /// Unique identifier for the person
    pub id: Uuid,

    /// Account that owns the person; fixed at creation
    pub owner_id: String,

    /// Tree the person belongs to; fixed at creation
    pub tree_id: Uuid,

    pub first_name: String,

    pub last_name: String,

    #[serde(default)]
    pub sex: Sex,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date: Option<NaiveDate>,

    /// Free-form note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<Uuid>,
}

impl Person {
    /// "First Last"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns the id linked under the given role
    pub fn relative(&self, role: RelativeRole) -> Option<Uuid> {
        match role {
            RelativeRole::Father => self.father_id,
            RelativeRole::Mother => self.mother_id,
            RelativeRole::Partner => self.partner_id,
        }
    }

    fn relative_mut(&mut self, role: RelativeRole) -> &mut Option<Uuid> {
        match role {
            RelativeRole::Father => &mut self.father_id,
            RelativeRole::Mother => &mut self.mother_id,
            RelativeRole::Partner => &mut self.partner_id,
        }
    }

    /// True if any of father, mother or partner points at `id`
    pub fn references(&self, id: &Uuid) -> bool {
        RelativeRole::ALL
            .iter()
            .any(|role| self.relative(*role).as_ref() == Some(id))
    }

    /// Clears every link that points at `id`. Returns true if anything changed.
    pub fn clear_references_to(&mut self, id: &Uuid) -> bool {
        let mut changed = false;
        for role in RelativeRole::ALL {
            let slot = self.relative_mut(role);
            if slot.as_ref() == Some(id) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }

    /// Life span for display, e.g. "1970-04-12 – —"
    pub fn life_span(&self) -> String {
        format!(
            "{} – {}",
            format_date(self.birth_date),
            format_date(self.death_date)
        )
    }
}

/// Formats an optional date, using "—" when it is absent
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// Caller-supplied data for creating or updating a person
///
/// When `id` names an existing person the call is an update and `owner_id` /
/// `tree_id` are ignored in favour of the stored values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonInput {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub owner_id: String,
    pub tree_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub father_id: Option<Uuid>,
    #[serde(default)]
    pub mother_id: Option<Uuid>,
    #[serde(default)]
    pub partner_id: Option<Uuid>,
}

impl PersonInput {
    /// Input for a new person with only the required fields set
    pub fn new(
        owner_id: impl Into<String>,
        tree_id: Uuid,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            owner_id: owner_id.into(),
            tree_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            sex: Sex::Unknown,
            birth_date: None,
            death_date: None,
            note: None,
            father_id: None,
            mother_id: None,
            partner_id: None,
        }
    }

    /// Returns the id supplied under the given role
    pub fn relative(&self, role: RelativeRole) -> Option<Uuid> {
        match role {
            RelativeRole::Father => self.father_id,
            RelativeRole::Mother => self.mother_id,
            RelativeRole::Partner => self.partner_id,
        }
    }
}

impl From<&Person> for PersonInput {
    fn from(person: &Person) -> Self {
        Self {
            id: Some(person.id),
            owner_id: person.owner_id.clone(),
            tree_id: person.tree_id,
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            sex: person.sex,
            birth_date: person.birth_date,
            death_date: person.death_date,
            note: person.note.clone(),
            father_id: person.father_id,
            mother_id: person.mother_id,
            partner_id: person.partner_id,
        }
    }
}

/// Every record a backend holds: one array per entity kind
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FamilyData {
    #[serde(default)]
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub persons: Vec<Person>,
}

impl FamilyData {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither trees nor persons are present
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.persons.is_empty()
    }
}
