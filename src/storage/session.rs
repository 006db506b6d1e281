//! Read-mutate-write handle around one task document
//!
//! A [`DocumentSession`] is what [`read_document`] hands back next to the
//! tasks. It owns the snapshot and relationships of the document and must be
//! passed back for every write, so formatting survives any number of
//! mutations in one process. There is no global cache: callers that want to
//! keep working on a document keep the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

use super::integrity::{IntegrityGuard, NoIntegrity};
use super::parser::{self, Diagnostic, ParseOptions};
use super::serializer;
use super::snapshot::StructureSnapshot;
use crate::domain::{
    DependencyGraph, EngineError, RelationKind, Relationships, Task, TaskId, TaskList,
};

/// Identity of the file content a snapshot was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
    digest: blake3::Hash,
}

impl Fingerprint {
    fn of(path: &Path, raw: &str) -> Result<Self> {
        let meta = fs::metadata(path)
            .with_context(|| format!("Failed to stat document: {}", path.display()))?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
            digest: blake3::hash(raw.as_bytes()),
        })
    }
}

/// An open task document
pub struct DocumentSession {
    path: PathBuf,
    snapshot: StructureSnapshot,
    relationships: Relationships,
    fingerprint: Option<Fingerprint>,
    diagnostics: Vec<Diagnostic>,
    guard: Box<dyn IntegrityGuard>,
    options: ParseOptions,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("path", &self.path)
            .field("fingerprint", &self.fingerprint)
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

/// Reads a document with default options and no integrity checks
pub fn read_document(path: impl AsRef<Path>) -> Result<(TaskList, DocumentSession)> {
    DocumentSession::open(path, Box::new(NoIntegrity), ParseOptions::default())
}

/// One-shot write without a session
pub fn write_document(
    path: impl AsRef<Path>,
    tasks: &[Task],
    snapshot: Option<&StructureSnapshot>,
    relationships: &Relationships,
) -> Result<()> {
    let path = path.as_ref();
    let text = serializer::serialize(tasks, snapshot, relationships)?;
    atomic_write(path, &text)
}

impl DocumentSession {
    /// Reads and parses an existing document
    pub fn open(
        path: impl AsRef<Path>,
        guard: Box<dyn IntegrityGuard>,
        options: ParseOptions,
    ) -> Result<(TaskList, Self)> {
        let mut session = Self {
            path: path.as_ref().to_path_buf(),
            snapshot: StructureSnapshot::empty(),
            relationships: Relationships::new(),
            fingerprint: None,
            diagnostics: Vec::new(),
            guard,
            options,
        };
        let tasks = session.load()?;
        Ok((tasks, session))
    }

    /// Starts a session for a document that does not exist yet
    pub fn create(
        path: impl AsRef<Path>,
        guard: Box<dyn IntegrityGuard>,
        options: ParseOptions,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: StructureSnapshot::new_document(),
            relationships: Relationships::new(),
            fingerprint: None,
            diagnostics: Vec::new(),
            guard,
            options,
        }
    }

    fn load(&mut self) -> Result<TaskList> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read document: {}", self.path.display()))?;
        self.guard.verify(&raw)?;

        let doc = parser::parse_with(&raw, self.options, chrono::Utc::now());
        self.snapshot = doc.snapshot;
        self.relationships = doc.relationships;
        self.diagnostics = doc.diagnostics;
        self.fingerprint = Some(Fingerprint::of(&self.path, &raw)?);

        tracing::debug!(path = %self.path.display(), tasks = doc.tasks.len(), "read document");
        Ok(TaskList::from_tasks(doc.tasks))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &StructureSnapshot {
        &self.snapshot
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// Lines from the last parse that looked structured but were kept as text
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Re-reads the document if it changed on disk since the last read or
    /// write. Returns the fresh tasks, or `None` if nothing changed.
    pub fn refresh_if_changed(&mut self) -> Result<Option<TaskList>> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read document: {}", self.path.display()))?;
        let current = Fingerprint::of(&self.path, &raw)?;
        if self.fingerprint.as_ref() == Some(&current) {
            return Ok(None);
        }
        tracing::debug!(path = %self.path.display(), "document changed on disk, re-parsing");
        self.load().map(Some)
    }

    /// Serializes `tasks` with this session's snapshot and writes atomically
    pub fn write_document(&mut self, tasks: &TaskList) -> Result<()> {
        let text = serializer::serialize(tasks.tasks(), Some(&self.snapshot), &self.relationships)?;
        atomic_write(&self.path, &text)?;
        self.guard.record(&text)?;
        self.fingerprint = Some(Fingerprint::of(&self.path, &text)?);

        tracing::debug!(path = %self.path.display(), tasks = tasks.len(), "wrote document");
        Ok(())
    }

    /// Replaces the targets of one relationship kind for `task`.
    ///
    /// Every ID must exist, and ordering kinds must stay acyclic. An empty
    /// target list removes the relationship.
    pub fn relate(
        &mut self,
        tasks: &TaskList,
        task: &TaskId,
        kind: RelationKind,
        targets: Vec<TaskId>,
    ) -> Result<()> {
        tasks.require(task)?;
        for target in &targets {
            tasks.require(target)?;
        }
        if kind.is_ordering() {
            DependencyGraph::check_replacement(&self.relationships, task, kind, &targets)?;
        }
        self.relationships.set(task.clone(), kind, targets);
        Ok(())
    }

    /// Drops relationships that mention any of `ids`
    pub fn forget_tasks<'a>(&mut self, ids: impl IntoIterator<Item = &'a TaskId>) {
        for id in ids {
            self.relationships.forget(id);
        }
    }

    /// Prerequisites of `task` that are still pending
    pub fn open_dependencies(&self, tasks: &TaskList, task: &TaskId) -> Result<Vec<TaskId>, EngineError> {
        tasks.require(task)?;
        // A hand-edited cycle only loses the edge that closes it
        let (graph, skipped) = DependencyGraph::from_relationships_lenient(&self.relationships);
        for e in skipped {
            tracing::warn!(error = %e, "ignoring relationship that closes a cycle");
        }
        Ok(graph.open_dependencies(task, &tasks.statuses()))
    }
}

/// Writes `content` to `path` through a temp file and rename
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
