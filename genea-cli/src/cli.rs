use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Record family trees: people, parents and partners")]
pub struct Cli {
    /// Path to the data file (.yaml or .db)
    #[clap(long, global = true)]
    pub data: Option<PathBuf>,

    /// Storage backend (yaml, sqlite); inferred from the file extension by default
    #[clap(long, global = true)]
    pub backend: Option<String>,

    /// Owner (account) id to act as
    #[clap(long, global = true)]
    pub owner: Option<String>,

    /// Print debug logging
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tree management commands
    #[clap(subcommand)]
    Tree(TreeCommand),

    /// Person management commands
    #[clap(subcommand)]
    Person(PersonCommand),

    /// Create a demo tree if the owner has none
    Seed,

    /// Show how many trees and persons the owner has
    Stats,

    /// Database management commands
    #[clap(subcommand)]
    Db(DbCommand),

    /// Export a tree as text or Markdown
    Export {
        /// Tree id
        #[clap(long)]
        tree: String,

        /// Output format (text, markdown)
        #[clap(long, short = 'f', default_value = "text")]
        format: String,

        /// Output file path; prints to stdout when omitted
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TreeCommand {
    /// Create a new tree
    Add {
        /// Name of the tree (at least 3 characters)
        #[clap(long)]
        name: String,
    },

    /// List the owner's trees
    List,

    /// Show a tree with its persons
    Show {
        /// Tree id
        id: String,
    },

    /// Delete a tree and every person in it
    Del {
        /// Tree id
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

/// Person fields shared by `person add` and `person edit`
#[derive(Args, Debug, Default)]
pub struct PersonFields {
    /// First name (at least 2 characters)
    #[clap(long)]
    pub first: Option<String>,

    /// Last name (at least 2 characters)
    #[clap(long)]
    pub last: Option<String>,

    /// Sex (m, f, unknown)
    #[clap(long)]
    pub sex: Option<String>,

    /// Birth date (YYYY-MM-DD, empty to clear)
    #[clap(long)]
    pub born: Option<String>,

    /// Death date (YYYY-MM-DD, empty to clear)
    #[clap(long)]
    pub died: Option<String>,

    /// Free-form note (empty to clear)
    #[clap(long)]
    pub note: Option<String>,

    /// Father's person id (empty to clear)
    #[clap(long)]
    pub father: Option<String>,

    /// Mother's person id (empty to clear)
    #[clap(long)]
    pub mother: Option<String>,

    /// Partner's person id (empty to clear)
    #[clap(long)]
    pub partner: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PersonCommand {
    /// Add a person to a tree; prompts for the fields when no names are given
    Add {
        /// Tree id
        #[clap(long)]
        tree: String,

        #[clap(flatten)]
        fields: PersonFields,
    },

    /// Edit an existing person; only the given fields change
    Edit {
        /// Person id
        id: String,

        #[clap(flatten)]
        fields: PersonFields,
    },

    /// List the persons of a tree
    List {
        /// Tree id
        #[clap(long)]
        tree: String,
    },

    /// Show a person with parents, partner and children
    Show {
        /// Person id
        id: String,
    },

    /// Delete a person; links to them are cleared
    Del {
        /// Person id
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the path of the data file in use
    Path,

    /// Copy all data into another data file (backend chosen by extension)
    Migrate {
        /// Destination data file
        #[clap(long)]
        to: PathBuf,
    },

    /// Export all data to JSON
    Export {
        /// Output file path
        #[clap(long, short = 'o', default_value = "genea.json")]
        output: PathBuf,
    },

    /// Replace all data with the content of a JSON export
    Import {
        /// Input file path
        #[clap(long, short = 'i')]
        input: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}
