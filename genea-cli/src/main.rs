mod cli;
mod prompts;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use colored::Colorize;
use log::debug;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use genea_core::db::{self, BackendType};
use genea_core::export::{self, ExportFormat};
use genea_core::models::{format_date, DATE_FORMAT};
use genea_core::{
    get_config_path, Config, EntityKind, Person, PersonInput, RelationshipStore, Sex,
    StoreError,
};

use crate::cli::{Cli, Command, DbCommand, PersonCommand, PersonFields, TreeCommand};

/// Everything a command needs: the open store and who is acting
struct Session {
    store: RelationshipStore,
    owner: String,
    data_path: PathBuf,
    backend: Option<BackendType>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load_or_default(get_config_path()?)?;
    let data_path = config.resolve_data_path(cli.data.as_deref());
    let backend = match &cli.backend {
        Some(name) => Some(parse_backend(name)?),
        None => config.backend,
    };
    let owner = config.resolve_owner(cli.owner.as_deref());
    debug!("Using {:?} as owner {}", data_path, owner);

    let store = RelationshipStore::open(&data_path, backend)
        .with_context(|| format!("Failed to open data file {:?}", data_path))?;
    let session = Session {
        store,
        owner,
        data_path,
        backend,
    };

    match &cli.command {
        Command::Tree(cmd) => handle_tree_command(cmd, &session)?,
        Command::Person(cmd) => handle_person_command(cmd, &session)?,
        Command::Seed => match session.store.seed_demo_if_empty(&session.owner)? {
            Some(tree) => println!(
                "{} Created demo tree '{}' ({})",
                "✓".green(),
                tree.name,
                tree.id
            ),
            None => println!("{}", "Owner already has trees, nothing seeded.".yellow()),
        },
        Command::Stats => {
            let stats = session.store.owner_stats(&session.owner)?;
            println!("Owner:   {}", session.owner.bold());
            println!("Trees:   {}", stats.trees);
            println!("Persons: {}", stats.persons);
        }
        Command::Db(cmd) => handle_db_command(cmd, &session)?,
        Command::Export {
            tree,
            format,
            output,
        } => handle_export_command(&session, tree, format, output.as_deref())?,
    }

    Ok(())
}

// =============================================================================
// Trees
// =============================================================================

fn handle_tree_command(cmd: &TreeCommand, session: &Session) -> Result<()> {
    let store = &session.store;

    match cmd {
        TreeCommand::Add { name } => {
            let tree = store.create_tree(&session.owner, name)?;
            println!("{}", "Tree created successfully!".green());
            println!("ID: {}", tree.id);
        }
        TreeCommand::List => {
            let trees = store.list_trees(&session.owner)?;
            if trees.is_empty() {
                println!("{}", "No trees yet. Use 'genea tree add' or 'genea seed'.".yellow());
                return Ok(());
            }
            for tree in trees {
                let count = store.list_persons(&session.owner, &tree.id)?.len();
                println!(
                    "{}  {}  {} ({} persons)",
                    tree.id.to_string().dimmed(),
                    tree.created_at.format("%Y-%m-%d"),
                    tree.name.bold(),
                    count
                );
            }
        }
        TreeCommand::Show { id } => {
            let tree_id = parse_uuid(id)?;
            let rendered =
                export::render_tree(store, &session.owner, &tree_id, ExportFormat::Text)?;
            print!("{}", rendered);
        }
        TreeCommand::Del { id, yes } => {
            let tree_id = parse_uuid(id)?;
            let tree = store.get_tree(&session.owner, &tree_id)?;
            let count = store.list_persons(&session.owner, &tree_id)?.len();

            println!("{}", "Tree to delete:".yellow());
            println!("  ID: {}", tree.id);
            println!("  Name: {}", tree.name);
            println!("  Persons: {}", count);

            if !*yes && !confirm("Delete this tree and all its persons?")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            let removed = store.delete_tree(&session.owner, &tree_id)?;
            println!(
                "{} Tree deleted together with {} persons.",
                "✓".green(),
                removed
            );
        }
    }

    Ok(())
}

// =============================================================================
// Persons
// =============================================================================

fn handle_person_command(cmd: &PersonCommand, session: &Session) -> Result<()> {
    let store = &session.store;

    match cmd {
        PersonCommand::Add { tree, fields } => {
            let tree_id = parse_uuid(tree)?;
            let input = match (&fields.first, &fields.last) {
                (None, None) => prompts::prompt_new_person(store, &session.owner, tree_id)?,
                (Some(first), Some(last)) => {
                    let mut input =
                        PersonInput::new(session.owner.clone(), tree_id, first, last);
                    apply_fields(&mut input, fields)?;
                    input
                }
                _ => anyhow::bail!("Give both --first and --last, or neither to be prompted."),
            };

            let person = store.upsert_person(input)?;
            println!("{}", "Person added successfully!".green());
            println!("ID: {}", person.id);
        }
        PersonCommand::Edit { id, fields } => {
            let person = require_person(store, &session.owner, id)?;
            let mut input = PersonInput::from(&person);
            if let Some(first) = &fields.first {
                input.first_name = first.clone();
            }
            if let Some(last) = &fields.last {
                input.last_name = last.clone();
            }
            apply_fields(&mut input, fields)?;

            let person = store.upsert_person(input)?;
            println!("{} Saved changes to {}.", "✓".green(), person.full_name());
        }
        PersonCommand::List { tree } => {
            let tree_id = parse_uuid(tree)?;
            let tree = store.get_tree(&session.owner, &tree_id)?;
            let persons = store.list_persons(&session.owner, &tree_id)?;

            println!("{} ({} persons)", tree.name.bold(), persons.len());
            for person in &persons {
                print_person_line(person, &persons);
            }
        }
        PersonCommand::Show { id } => {
            let person = require_person(store, &session.owner, id)?;
            let relatives = store.relatives_of(&person.id)?;
            let children = store.children_of(&person.id)?;

            let name_or_dash = |p: Option<&Person>| {
                p.map(|p| format!("{} ({})", p.full_name(), p.id))
                    .unwrap_or_else(|| "—".to_string())
            };

            println!("{}", person.full_name().bold());
            println!("  ID:      {}", person.id);
            println!("  Tree:    {}", person.tree_id);
            println!("  Sex:     {}", person.sex);
            println!("  Born:    {}", format_date(person.birth_date));
            println!("  Died:    {}", format_date(person.death_date));
            if let Some(note) = &person.note {
                println!("  Note:    {}", note);
            }
            println!("  Father:  {}", name_or_dash(relatives.father.as_ref()));
            println!("  Mother:  {}", name_or_dash(relatives.mother.as_ref()));
            println!("  Partner: {}", name_or_dash(relatives.partner.as_ref()));
            if !children.is_empty() {
                println!("  Children:");
                for child in &children {
                    println!("    - {} ({})", child.full_name(), child.id);
                }
            }
        }
        PersonCommand::Del { id, yes } => {
            let person = require_person(store, &session.owner, id)?;

            println!("{}", "Person to delete:".yellow());
            println!("  ID: {}", person.id);
            println!("  Name: {}", person.full_name());

            if !*yes && !confirm("Delete this person? Their relationships will be cleared.")? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            store.delete_person(&person.id)?;
            println!("{}", "Person deleted successfully!".green());
        }
    }

    Ok(())
}

/// Copies the optional flags onto `input`; an empty value clears the field
fn apply_fields(input: &mut PersonInput, fields: &PersonFields) -> Result<()> {
    if let Some(sex) = &fields.sex {
        input.sex = parse_sex(sex)?;
    }
    if let Some(born) = &fields.born {
        input.birth_date = parse_date(born)?;
    }
    if let Some(died) = &fields.died {
        input.death_date = parse_date(died)?;
    }
    if let Some(note) = &fields.note {
        input.note = Some(note.clone()).filter(|n| !n.trim().is_empty());
    }
    if let Some(father) = &fields.father {
        input.father_id = parse_link(father)?;
    }
    if let Some(mother) = &fields.mother {
        input.mother_id = parse_link(mother)?;
    }
    if let Some(partner) = &fields.partner {
        input.partner_id = parse_link(partner)?;
    }
    Ok(())
}

fn print_person_line(person: &Person, persons: &[Person]) {
    let name_of = |link: Option<Uuid>| {
        link.and_then(|id| persons.iter().find(|p| p.id == id))
            .map(|p| p.full_name())
            .unwrap_or_else(|| "—".to_string())
    };

    println!(
        "{}  {} [{}]  {}  parents: {} / {}  partner: {}",
        person.id.to_string().dimmed(),
        person.full_name().bold(),
        person.sex,
        person.life_span(),
        name_of(person.father_id),
        name_of(person.mother_id),
        name_of(person.partner_id)
    );
}

/// The person `id`, only if `owner_id` owns them
fn require_person(store: &RelationshipStore, owner_id: &str, id: &str) -> Result<Person> {
    let id = parse_uuid(id)?;
    store
        .get_person(&id)?
        .filter(|p| p.owner_id == owner_id)
        .ok_or(StoreError::NotFound {
            kind: EntityKind::Person,
            id,
        })
        .map_err(Into::into)
}

// =============================================================================
// Database and export
// =============================================================================

fn handle_db_command(cmd: &DbCommand, session: &Session) -> Result<()> {
    match cmd {
        DbCommand::Path => {
            println!("{}", session.data_path.display());
        }
        DbCommand::Migrate { to } => {
            let destination = db::create_backend(to, None)?;
            let stats = db::migrate(session.store.backend(), destination.as_ref())?;
            println!(
                "{} Migrated {} trees and {} persons to {} ({})",
                "✓".green(),
                stats.tree_count,
                stats.person_count,
                to.display(),
                stats.backend_type
            );
        }
        DbCommand::Export { output } => {
            db::export_backend_to_json(session.store.backend(), output)?;
            println!("Exported to JSON: {}", output.display());
        }
        DbCommand::Import { input, yes } => {
            if !*yes && !confirm("Replace ALL data in the current data file?")? {
                println!("{}", "Import cancelled.".yellow());
                return Ok(());
            }
            let stats = db::import_json_to_backend(input, session.store.backend())?;
            println!(
                "{} Imported {} trees and {} persons into {} ({})",
                "✓".green(),
                stats.tree_count,
                stats.person_count,
                session.data_path.display(),
                session
                    .backend
                    .unwrap_or_else(|| BackendType::from_path(&session.data_path))
            );
        }
    }

    Ok(())
}

fn handle_export_command(
    session: &Session,
    tree: &str,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let tree_id = parse_uuid(tree)?;
    let format = match format.to_lowercase().as_str() {
        "text" | "txt" => ExportFormat::Text,
        "markdown" | "md" => ExportFormat::Markdown,
        _ => anyhow::bail!(
            "Unknown export format: {}. Supported formats: text, markdown",
            format
        ),
    };

    match output {
        Some(path) => {
            export::export_tree(&session.store, &session.owner, &tree_id, format, path)?;
            println!("Exported tree to {}", path.display());
        }
        None => {
            let rendered = export::render_tree(&session.store, &session.owner, &tree_id, format)?;
            print!("{}", rendered);
        }
    }

    Ok(())
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn confirm(message: &str) -> Result<bool> {
    Ok(inquire::Confirm::new(message).with_default(false).prompt()?)
}

fn parse_uuid(id_str: &str) -> Result<Uuid> {
    Uuid::parse_str(id_str.trim()).with_context(|| format!("Invalid id: {}", id_str))
}

/// Empty string clears the link
fn parse_link(id_str: &str) -> Result<Option<Uuid>> {
    if id_str.trim().is_empty() {
        return Ok(None);
    }
    parse_uuid(id_str).map(Some)
}

/// Empty string clears the date
fn parse_date(date_str: &str) -> Result<Option<NaiveDate>> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(date_str, DATE_FORMAT)
        .map(Some)
        .with_context(|| format!("Invalid date: {} (expected YYYY-MM-DD)", date_str))
}

fn parse_sex(sex_str: &str) -> Result<Sex> {
    match sex_str.trim().to_lowercase().as_str() {
        "m" | "male" => Ok(Sex::Male),
        "f" | "female" => Ok(Sex::Female),
        "" | "u" | "unknown" => Ok(Sex::Unknown),
        _ => anyhow::bail!("Invalid sex: {} (use m, f or unknown)", sex_str),
    }
}

fn parse_backend(name: &str) -> Result<BackendType> {
    match name.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(BackendType::Yaml),
        "sqlite" | "db" => Ok(BackendType::Sqlite),
        _ => anyhow::bail!("Invalid backend: {} (use yaml or sqlite)", name),
    }
}
