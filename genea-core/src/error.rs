//! Error types returned by the relationship store

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{EntityKind, RelativeRole};

/// Caller-supplied data breaks one of the store's rules.
///
/// The message is meant to be shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Owner id must not be empty")]
    MissingOwner,

    #[error("Tree name must have at least {min} characters")]
    TreeNameTooShort { min: usize },

    #[error("First name must have at least {min} characters")]
    FirstNameTooShort { min: usize },

    #[error("Last name must have at least {min} characters")]
    LastNameTooShort { min: usize },

    #[error("Birth date {birth} is after death date {death}")]
    BirthAfterDeath { birth: NaiveDate, death: NaiveDate },

    #[error("A person cannot be set as their own {role}")]
    SelfReference { role: RelativeRole },

    #[error("Selected {role} {id} is not a person in this tree")]
    UnknownRelative { role: RelativeRole, id: Uuid },

    #[error("{kind} {id} appears more than once")]
    DuplicateId { kind: EntityKind, id: Uuid },

    #[error("Person {id} belongs to tree {tree_id}, which its owner does not have")]
    UnknownTree { id: Uuid, tree_id: Uuid },
}

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Storage backend failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Backend failures may succeed on a later attempt; rule violations never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Backend(_))
    }

    /// The validation failure, if this is one
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            StoreError::Validation(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
