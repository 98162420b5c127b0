use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Person, Sex, Tree};
use crate::store::RelationshipStore;

/// Output formats for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Markdown,
}

fn sex_label(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "M",
        Sex::Female => "F",
        Sex::Unknown => "—",
    }
}

/// Name of a linked person, or "—" when the link is empty or dangling
fn link_name(link: Option<Uuid>, by_id: &HashMap<Uuid, &Person>) -> String {
    link.and_then(|id| by_id.get(&id))
        .map(|p| p.full_name())
        .unwrap_or_else(|| "—".to_string())
}

/// Renders a tree as an aligned plain-text table
pub fn render_text(tree: &Tree, persons: &[Person]) -> String {
    let by_id: HashMap<Uuid, &Person> = persons.iter().map(|p| (p.id, p)).collect();
    let mut output = String::new();

    let _ = writeln!(output, "{}", tree.name);
    let _ = writeln!(
        output,
        "Created: {}  |  Persons: {}",
        tree.created_at.format("%Y-%m-%d %H:%M"),
        persons.len()
    );
    let _ = writeln!(output);

    for person in persons {
        let _ = writeln!(
            output,
            "{} ({})  {}",
            person.full_name(),
            sex_label(person.sex),
            person.life_span()
        );
        let _ = writeln!(
            output,
            "    parents: {} / {}",
            link_name(person.father_id, &by_id),
            link_name(person.mother_id, &by_id)
        );
        let _ = writeln!(output, "    partner: {}", link_name(person.partner_id, &by_id));
        if let Some(note) = &person.note {
            let _ = writeln!(output, "    note: {}", note);
        }
    }

    output
}

/// Renders a tree as a Markdown document with one table row per person
pub fn render_markdown(tree: &Tree, persons: &[Person]) -> String {
    let by_id: HashMap<Uuid, &Person> = persons.iter().map(|p| (p.id, p)).collect();
    let mut output = String::new();

    let _ = writeln!(output, "# {}\n", tree.name);
    let _ = writeln!(
        output,
        "_Created {}, {} persons_\n",
        tree.created_at.format("%Y-%m-%d"),
        persons.len()
    );

    if persons.is_empty() {
        let _ = writeln!(output, "No persons yet.");
        return output;
    }

    let _ = writeln!(output, "| Name | Sex | Life | Father / Mother | Partner | Note |");
    let _ = writeln!(output, "|------|-----|------|-----------------|---------|------|");
    for person in persons {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} / {} | {} | {} |",
            escape_cell(&person.full_name()),
            sex_label(person.sex),
            person.life_span(),
            escape_cell(&link_name(person.father_id, &by_id)),
            escape_cell(&link_name(person.mother_id, &by_id)),
            escape_cell(&link_name(person.partner_id, &by_id)),
            escape_cell(person.note.as_deref().unwrap_or("")),
        );
    }

    output
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

/// Renders one owner's tree in the given format
pub fn render_tree(
    store: &RelationshipStore,
    owner_id: &str,
    tree_id: &Uuid,
    format: ExportFormat,
) -> Result<String, StoreError> {
    let tree = store.get_tree(owner_id, tree_id)?;
    let persons = store.list_persons(owner_id, tree_id)?;
    Ok(match format {
        ExportFormat::Text => render_text(&tree, &persons),
        ExportFormat::Markdown => render_markdown(&tree, &persons),
    })
}

/// Writes one owner's tree to `output_path`
pub fn export_tree(
    store: &RelationshipStore,
    owner_id: &str,
    tree_id: &Uuid,
    format: ExportFormat,
    output_path: &Path,
) -> Result<()> {
    let rendered = render_tree(store, owner_id, tree_id, format)?;
    fs::write(output_path, rendered)
        .with_context(|| format!("Failed to write export to {}", output_path.display()))?;
    Ok(())
}
