use anyhow::Result;
use chrono::NaiveDate;
use inquire::{Select, Text};
use std::fmt;
use uuid::Uuid;

use genea_core::models::DATE_FORMAT;
use genea_core::{Person, PersonInput, RelationshipStore, RelativeRole, Sex};

/// One entry of a relative picker
struct Candidate {
    id: Option<Uuid>,
    label: String,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn candidates(persons: &[Person]) -> Vec<Candidate> {
    let mut options = vec![Candidate {
        id: None,
        label: "(none)".to_string(),
    }];
    options.extend(persons.iter().map(|p| Candidate {
        id: Some(p.id),
        label: format!("{}  {}", p.full_name(), p.life_span()),
    }));
    options
}

/// Prompts the user for a new person in `tree_id`
pub fn prompt_new_person(
    store: &RelationshipStore,
    owner_id: &str,
    tree_id: Uuid,
) -> Result<PersonInput> {
    let first_name = Text::new("First name:").prompt()?;
    let last_name = Text::new("Last name:").prompt()?;

    let mut input = PersonInput::new(owner_id, tree_id, first_name, last_name);

    let sex_options = vec![Sex::Unknown, Sex::Male, Sex::Female];
    input.sex = Select::new("Sex:", sex_options).prompt()?;

    input.birth_date = prompt_date("Birth date (YYYY-MM-DD, empty to skip):")?;
    input.death_date = prompt_date("Death date (YYYY-MM-DD, empty to skip):")?;

    let note = Text::new("Note:").prompt()?;
    input.note = Some(note).filter(|n| !n.trim().is_empty());

    let persons = store.relative_candidates(owner_id, &tree_id, None)?;
    if !persons.is_empty() {
        input.father_id = prompt_relative(RelativeRole::Father, &persons)?;
        input.mother_id = prompt_relative(RelativeRole::Mother, &persons)?;
        input.partner_id = prompt_relative(RelativeRole::Partner, &persons)?;
    }

    Ok(input)
}

/// Lets the user pick a person from the tree for one role
pub fn prompt_relative(role: RelativeRole, persons: &[Person]) -> Result<Option<Uuid>> {
    let message = format!("{}:", capitalize(&role.to_string()));
    let choice = Select::new(&message, candidates(persons)).prompt()?;
    Ok(choice.id)
}

fn prompt_date(message: &str) -> Result<Option<NaiveDate>> {
    let answer = Text::new(message)
        .with_validator(|input: &str| {
            let input = input.trim();
            if input.is_empty() || NaiveDate::parse_from_str(input, DATE_FORMAT).is_ok() {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Ok(inquire::validator::Validation::Invalid(
                    "Expected a date like 1970-04-12".into(),
                ))
            }
        })
        .prompt()?;

    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(None);
    }
    Ok(Some(NaiveDate::parse_from_str(answer, DATE_FORMAT)?))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
