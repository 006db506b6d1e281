//! Main CLI application

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::task::{self, ListArgs, Target};
use crate::domain::{RelationKind, TaskStatus};
use crate::storage::{Config, Project};

/// todo-md - A markdown task list that stays editable by hand
#[derive(Parser)]
#[command(name = "todo-md")]
#[command(author, version, about = "A markdown task list that stays editable by hand")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Task document (defaults to TODO.md in the project root)
    #[arg(long, global = true, env = "TODO_MD_FILE")]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a project around the task document
    Init,

    /// Add a root task
    ///
    /// Examples:
    ///   todo-md add "Fix typo"
    ///   todo-md add "Write release notes" --tag docs --tag release
    Add {
        /// Task description
        description: String,

        /// Tags to attach (repeatable, leading '#' optional)
        #[arg(long, short = 't')]
        tag: Vec<String>,
    },

    /// Add a subtask under an existing task
    Subtask {
        /// Parent task ID (e.g. 3 or 3.1)
        parent: String,

        /// Subtask description
        description: String,

        #[arg(long, short = 't')]
        tag: Vec<String>,
    },

    /// List tasks (active ones unless --all or --status is given)
    List {
        /// Only tasks with this status
        #[arg(long, short = 's')]
        status: Option<TaskStatus>,

        /// Only tasks with this tag
        #[arg(long, short = 't')]
        tag: Option<String>,

        /// Include archived and deleted tasks
        #[arg(long)]
        all: bool,
    },

    /// Show task details, notes and relationships
    Show {
        /// Task ID
        id: String,
    },

    /// Mark tasks as completed
    Complete {
        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Reopen completed tasks
    Undo {
        /// Task IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Tag a pending task as in progress
    Start {
        /// Task ID
        id: String,
    },

    /// Remove the in-progress tag
    Stop {
        /// Task ID
        id: String,
    },

    /// Move tasks to the archive
    ///
    /// Completed tasks archive freely; pending tasks need --reason.
    Archive {
        #[command(flatten)]
        target: Target,

        /// Why an unfinished task is being archived
        #[arg(long)]
        reason: Option<String>,
    },

    /// Soft-delete tasks (kept until the retention window passes)
    Delete {
        #[command(flatten)]
        target: Target,
    },

    /// Bring archived or deleted tasks back
    Restore {
        #[command(flatten)]
        target: Target,
    },

    /// Change a task's description or tags
    Modify {
        /// Task ID
        id: String,

        /// New description (omit to keep the current one)
        description: Option<String>,

        /// Replace tags with these (repeatable)
        #[arg(long, short = 't')]
        tag: Vec<String>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tag")]
        clear_tags: bool,
    },

    /// Append a note to a task
    Note {
        /// Task ID
        id: String,

        /// Note text (one note line per line)
        text: String,
    },

    /// Replace a task's notes
    NoteUpdate {
        /// Task ID
        id: String,

        /// New note text
        text: String,
    },

    /// Remove all notes from a task
    NoteClear {
        /// Task ID
        id: String,
    },

    /// Set or clear a relationship between tasks
    ///
    /// Examples:
    ///   todo-md relate 4 depends-on 2 3
    ///   todo-md relate 4 depends-on          # remove the relationship
    Relate {
        /// Task ID
        id: String,

        /// Relationship kind (blocks, completed-by, depends-on, duplicate-of, related-to)
        kind: RelationKind,

        /// Target task IDs (none removes the relationship)
        targets: Vec<String>,
    },

    /// Permanently remove deleted tasks whose retention has passed
    EmptyTrash,
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "todo_md=debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Runs the CLI application
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::global()?.default_format.into(),
    };
    let output = Output::new(format);

    let document = match cli.file {
        Some(file) => file,
        None => Project::locate(&env::current_dir().context("Failed to get current directory")?),
    };
    tracing::debug!(document = %document.display(), "resolved task document");

    match cli.command {
        Commands::Init => task::init(&output, document),
        Commands::Add { description, tag } => task::add(&output, &document, &description, &tag),
        Commands::Subtask {
            parent,
            description,
            tag,
        } => task::subtask(&output, &document, &parent, &description, &tag),
        Commands::List { status, tag, all } => {
            task::list(&output, &document, ListArgs { status, tag, all })
        }
        Commands::Show { id } => task::show(&output, &document, &id),
        Commands::Complete { ids } => task::complete(&output, &document, &ids),
        Commands::Undo { ids } => task::undo(&output, &document, &ids),
        Commands::Start { id } => task::start(&output, &document, &id),
        Commands::Stop { id } => task::stop(&output, &document, &id),
        Commands::Archive { target, reason } => {
            task::archive(&output, &document, &target, reason.as_deref())
        }
        Commands::Delete { target } => task::delete(&output, &document, &target),
        Commands::Restore { target } => task::restore(&output, &document, &target),
        Commands::Modify {
            id,
            description,
            tag,
            clear_tags,
        } => {
            let tags = (clear_tags || !tag.is_empty()).then_some(tag);
            task::modify(&output, &document, &id, description.as_deref(), tags.as_deref())
        }
        Commands::Note { id, text } => task::note(&output, &document, &id, &text),
        Commands::NoteUpdate { id, text } => task::note_update(&output, &document, &id, &text),
        Commands::NoteClear { id } => task::note_clear(&output, &document, &id),
        Commands::Relate { id, kind, targets } => {
            task::relate(&output, &document, &id, kind, &targets)
        }
        Commands::EmptyTrash => task::empty_trash(&output, &document),
    }
}
