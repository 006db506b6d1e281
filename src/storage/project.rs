//! Project management
//!
//! A project is a task document plus the `.todo-md/` state directory next to
//! it. This wires configuration, the ID allocator and the integrity guard
//! into document sessions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::{Config, STATE_DIR};
use super::integrity::{ChecksumGuard, IntegrityGuard, NoIntegrity};
use super::parser::ParseOptions;
use super::session::{atomic_write, DocumentSession};
use crate::domain::{IdAllocator, SequentialAllocator, TaskId, TaskList};

/// Default document name
pub const DOCUMENT_NAME: &str = "TODO.md";

const SERIAL_FILE: &str = "serial";
const CHECKSUM_FILE: &str = "checksum";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("No task document at {0}. Run 'todo-md init' first.")]
    NotInProject(PathBuf),

    #[error("ID allocator returned an invalid task ID: {0}")]
    InvalidAllocation(String),
}

/// A todo-md project
pub struct Project {
    root: PathBuf,
    document: PathBuf,
    config: Config,
}

impl Project {
    /// Opens the project owning an existing document
    pub fn open(document: impl Into<PathBuf>) -> Result<Self> {
        let document = document.into();
        if !document.is_file() {
            return Err(ProjectError::NotInProject(document).into());
        }

        let root = project_root_of(&document);
        let config = Config::for_project(&root)?;

        Ok(Self {
            root,
            document,
            config,
        })
    }

    /// Finds the document for the current directory: the nearest directory
    /// with a `.todo-md/` state directory, else the current directory
    pub fn locate(cwd: &Path) -> PathBuf {
        Config::find_project_root(cwd)
            .unwrap_or_else(|| cwd.to_path_buf())
            .join(DOCUMENT_NAME)
    }

    /// Initializes a project around `document`, creating the document if
    /// missing. An existing document is adopted as is.
    pub fn init(document: impl Into<PathBuf>) -> Result<Self> {
        let document = document.into();
        let root = project_root_of(&document);
        let state_dir = root.join(STATE_DIR);

        if state_dir.is_dir() && document.is_file() {
            return Err(ProjectError::AlreadyExists(root).into());
        }

        fs::create_dir_all(&state_dir).with_context(|| {
            format!("Failed to create state directory: {}", state_dir.display())
        })?;

        let config_path = Config::project_config_path(&root);
        if !config_path.exists() {
            let default_config = r#"# todo-md configuration

retention:
  # Days a deleted task is kept before 'todo-md empty-trash' removes it
  deleted_days: 30

parser:
  # Warn about lines that look like tasks but could not be read
  strict: false

integrity:
  # Refuse to read the document after edits made outside todo-md
  enabled: false
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = state_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, "# Local integrity state\nchecksum\n").with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self {
            config: Config::for_project(&root)?,
            root,
            document,
        };

        if !project.document.exists() {
            let mut session =
                DocumentSession::create(&project.document, project.guard(), project.parse_options());
            session.write_document(&TaskList::new())?;
            tracing::info!(path = %project.document.display(), "created task document");
        }

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> &Path {
        &self.document
    }

    /// Returns the .todo-md directory path
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            strict: self.config.project.parser.strict,
        }
    }

    fn guard(&self) -> Box<dyn IntegrityGuard> {
        if self.config.project.integrity.enabled {
            Box::new(ChecksumGuard::new(self.state_dir().join(CHECKSUM_FILE)))
        } else {
            Box::new(NoIntegrity)
        }
    }

    /// Opens the document with the project's parser options and guard
    pub fn open_document(&self) -> Result<(TaskList, DocumentSession)> {
        DocumentSession::open(&self.document, self.guard(), self.parse_options())
    }

    /// Highest root number ever handed out, kept so deleted IDs are not reused
    pub fn serial(&self) -> Result<u32> {
        let path = self.state_dir().join(SERIAL_FILE);
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read serial: {}", path.display()))?;
        content
            .trim()
            .parse()
            .with_context(|| format!("Invalid serial in {}", path.display()))
    }

    fn set_serial(&self, serial: u32) -> Result<()> {
        atomic_write(&self.state_dir().join(SERIAL_FILE), &format!("{}\n", serial))
    }

    /// Allocates the ID for a new root task and advances the serial
    pub fn allocate_root_id(&self, tasks: &TaskList) -> Result<TaskId> {
        self.allocate_with(&SequentialAllocator, tasks)
    }

    /// Allocates a root ID through any allocator
    pub fn allocate_with(&self, allocator: &dyn IdAllocator, tasks: &TaskList) -> Result<TaskId> {
        let raw = allocator.allocate_next_id(tasks.max_root_sequence(), self.serial()?)?;
        let id: TaskId = raw
            .parse()
            .map_err(|_| ProjectError::InvalidAllocation(raw.clone()))?;
        if !id.is_root() {
            return Err(ProjectError::InvalidAllocation(raw).into());
        }

        self.set_serial(id.root_sequence().max(self.serial()?))?;
        Ok(id)
    }
}

fn project_root_of(document: &Path) -> PathBuf {
    match document.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
