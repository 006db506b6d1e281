//! Task commands
//!
//! Each handler opens the document, applies one mutation to the in-memory
//! [`TaskList`] and writes it back through the same [`DocumentSession`]. A
//! failure anywhere before the write leaves the file untouched.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;

use super::output::Output;
use crate::domain::{RelationKind, Task, TaskFilter, TaskId, TaskList, TaskStatus};
use crate::storage::{DocumentSession, Project};

/// Task IDs plus the subtask switch shared by cascading commands
#[derive(Args)]
pub struct Target {
    /// Task IDs
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Leave subtasks alone
    #[arg(long)]
    pub no_subtasks: bool,
}

pub struct ListArgs {
    pub status: Option<TaskStatus>,
    pub tag: Option<String>,
    pub all: bool,
}

/// An open project document
struct Workspace {
    project: Project,
    tasks: TaskList,
    session: DocumentSession,
}

impl Workspace {
    fn open(document: &Path) -> Result<Self> {
        let project = Project::open(document)?;
        let (tasks, session) = project.open_document()?;
        Ok(Self {
            project,
            tasks,
            session,
        })
    }

    fn save(&mut self) -> Result<()> {
        self.session.write_document(&self.tasks)
    }
}

fn parse_id(raw: &str) -> Result<TaskId> {
    Ok(raw.parse()?)
}

fn parse_ids(raw: &[String]) -> Result<Vec<TaskId>> {
    raw.iter().map(|s| parse_id(s)).collect()
}

fn id_strings(ids: &[TaskId]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn hashes(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| format!("#{}", id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn require_text(text: &str, what: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("{} cannot be empty", what);
    }
    Ok(())
}

pub fn init(output: &Output, document: PathBuf) -> Result<()> {
    let project = Project::init(document)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "success": true,
            "root": project.root(),
            "document": project.document_path(),
        }));
    } else {
        output.success(&format!(
            "Initialized todo-md project at {}",
            project.root().display()
        ));
        println!("Task document: {}", project.document_path().display());
    }
    Ok(())
}

fn report_added(output: &Output, task: &Task) {
    if output.is_json() {
        output.data(task);
    } else {
        output.success(&format!("Added #{}: {}", task.id, task.description));
    }
}

pub fn add(output: &Output, document: &Path, description: &str, tags: &[String]) -> Result<()> {
    require_text(description, "Task description")?;
    let mut ws = Workspace::open(document)?;

    let id = ws.project.allocate_root_id(&ws.tasks)?;
    let task = ws.tasks.add_task(id, description, tags, Utc::now())?.clone();
    ws.save()?;

    report_added(output, &task);
    Ok(())
}

pub fn subtask(
    output: &Output,
    document: &Path,
    parent: &str,
    description: &str,
    tags: &[String],
) -> Result<()> {
    require_text(description, "Task description")?;
    let parent = parse_id(parent)?;
    let mut ws = Workspace::open(document)?;

    let task = ws
        .tasks
        .add_subtask(&parent, description, tags, Utc::now())?
        .clone();
    ws.save()?;

    report_added(output, &task);
    Ok(())
}

/// One task as a list line: indent, checkbox, id, description, tags
fn render_line(task: &Task) -> String {
    let mark = match task.status {
        TaskStatus::Pending => " ",
        TaskStatus::Completed | TaskStatus::Archived => "x",
        TaskStatus::Deleted => "D",
    };
    let mut line = format!(
        "{}[{}] #{} {}",
        "  ".repeat(task.id.depth()),
        mark,
        task.id,
        task.description
    );
    for tag in &task.tags {
        line.push_str(&format!(" #{}", tag));
    }
    if !task.status.is_active() {
        line.push_str(&format!(" ({})", task.status));
    }
    line
}

pub fn list(output: &Output, document: &Path, args: ListArgs) -> Result<()> {
    let ws = Workspace::open(document)?;
    let show_inactive = args.all || args.status.is_some();

    let filter = TaskFilter {
        status: args.status,
        tag: args.tag,
    };
    let mut tasks: Vec<&Task> = ws
        .tasks
        .list(&filter)
        .into_iter()
        .filter(|t| show_inactive || t.status.is_active())
        .collect();
    tasks.sort_by(|a, b| a.id.cmp(&b.id));

    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks");
    } else {
        for task in tasks {
            println!("{}", render_line(task));
        }
    }

    if !ws.session.diagnostics().is_empty() {
        output.warn(&format!(
            "{} line(s) looked like tasks but could not be read; run with --verbose for details",
            ws.session.diagnostics().len()
        ));
    }
    Ok(())
}

pub fn show(output: &Output, document: &Path, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let ws = Workspace::open(document)?;

    let task = ws.tasks.require(&id)?;
    let subtasks: Vec<TaskId> = ws.tasks.get_children(&id).iter().map(|t| t.id.clone()).collect();
    let relations: Vec<(RelationKind, Vec<TaskId>)> = ws
        .session
        .relationships()
        .get(&id)
        .map(|kinds| kinds.iter().map(|(k, v)| (*k, v.clone())).collect())
        .unwrap_or_default();
    let open_deps = ws.session.open_dependencies(&ws.tasks, &id)?;

    if output.is_json() {
        let relationships: serde_json::Map<String, serde_json::Value> = relations
            .iter()
            .map(|(kind, targets)| (kind.to_string(), serde_json::json!(id_strings(targets))))
            .collect();
        output.data(&serde_json::json!({
            "task": task,
            "subtasks": id_strings(&subtasks),
            "relationships": relationships,
            "open_dependencies": id_strings(&open_deps),
        }));
        return Ok(());
    }

    println!("Task: #{}", task.id);
    println!("Description: {}", task.description);
    println!("Status: {}", task.status);
    if task.is_in_progress() {
        println!("In progress: yes");
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
        println!("Tags: {}", tags.join(" "));
    }
    if let Some(parent) = task.parent_id() {
        println!("Parent: #{}", parent);
    }
    if let Some(at) = task.completed_at {
        println!("Completed: {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = task.archived_at {
        println!("Archived: {}", at.format("%Y-%m-%d"));
    }
    if let Some(at) = task.deleted_at {
        println!("Deleted: {}", at.format("%Y-%m-%d"));
    }
    if let Some(at) = task.expires_at {
        println!("Expires: {}", at.format("%Y-%m-%d"));
    }

    if !subtasks.is_empty() {
        println!("\nSubtasks:");
        for child in &subtasks {
            if let Some(child) = ws.tasks.get(child) {
                println!("  {}", render_line(child).trim_start());
            }
        }
    }

    if !task.notes.is_empty() {
        println!("\nNotes:");
        for note in &task.notes {
            println!("  {}", note);
        }
    }

    if !relations.is_empty() {
        println!("\nRelationships:");
        for (kind, targets) in &relations {
            println!("  {}: {}", kind, hashes(targets));
        }
    }

    if !open_deps.is_empty() {
        println!("\nWaiting on: {}", hashes(&open_deps));
    }
    Ok(())
}

pub fn complete(output: &Output, document: &Path, ids: &[String]) -> Result<()> {
    let ids = parse_ids(ids)?;
    let mut ws = Workspace::open(document)?;
    let now = Utc::now();

    for id in &ids {
        ws.tasks.complete(id, now)?;
        let open = ws.session.open_dependencies(&ws.tasks, id)?;
        if !open.is_empty() {
            output.warn(&format!("#{} depends on open tasks {}", id, hashes(&open)));
        }
    }
    ws.save()?;

    output.changed(&format!("Completed {}", hashes(&ids)), &id_strings(&ids));
    Ok(())
}

pub fn undo(output: &Output, document: &Path, ids: &[String]) -> Result<()> {
    let ids = parse_ids(ids)?;
    let mut ws = Workspace::open(document)?;
    let now = Utc::now();

    for id in &ids {
        ws.tasks.undo(id, now)?;
    }
    ws.save()?;

    output.changed(&format!("Reopened {}", hashes(&ids)), &id_strings(&ids));
    Ok(())
}

pub fn start(output: &Output, document: &Path, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    ws.tasks.start(&id, Utc::now())?;
    ws.save()?;

    output.success(&format!("Started #{}", id));
    Ok(())
}

pub fn stop(output: &Output, document: &Path, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    ws.tasks.stop(&id, Utc::now())?;
    ws.save()?;

    output.success(&format!("Stopped #{}", id));
    Ok(())
}

/// Runs a cascading operation over every target and reports what changed
fn cascade_each<F>(
    output: &Output,
    document: &Path,
    target: &Target,
    verb: &str,
    mut op: F,
) -> Result<()>
where
    F: FnMut(&mut Workspace, &TaskId, bool) -> Result<Vec<TaskId>>,
{
    let ids = parse_ids(&target.ids)?;
    let mut ws = Workspace::open(document)?;

    let mut changed = Vec::new();
    for id in &ids {
        changed.extend(op(&mut ws, id, !target.no_subtasks)?);
    }
    ws.save()?;

    if changed.is_empty() {
        output.changed("No tasks changed", &[]);
    } else {
        output.changed(&format!("{} {}", verb, hashes(&changed)), &id_strings(&changed));
    }
    Ok(())
}

pub fn archive(
    output: &Output,
    document: &Path,
    target: &Target,
    reason: Option<&str>,
) -> Result<()> {
    cascade_each(output, document, target, "Archived", |ws, id, subtasks| {
        Ok(ws.tasks.archive(id, reason, subtasks, Utc::now())?)
    })
}

pub fn delete(output: &Output, document: &Path, target: &Target) -> Result<()> {
    cascade_each(output, document, target, "Deleted", |ws, id, subtasks| {
        let retention = ws.project.config().project.retention();
        Ok(ws.tasks.delete(id, retention, subtasks, Utc::now())?)
    })
}

pub fn restore(output: &Output, document: &Path, target: &Target) -> Result<()> {
    cascade_each(output, document, target, "Restored", |ws, id, subtasks| {
        Ok(ws.tasks.restore(id, subtasks, Utc::now())?)
    })
}

pub fn modify(
    output: &Output,
    document: &Path,
    id: &str,
    description: Option<&str>,
    tags: Option<&[String]>,
) -> Result<()> {
    if description.is_none() && tags.is_none() {
        bail!("Nothing to modify: give a new description, --tag or --clear-tags");
    }
    if let Some(description) = description {
        require_text(description, "Task description")?;
    }

    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    let task = ws.tasks.modify(&id, description, tags, Utc::now())?.clone();
    ws.save()?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Modified #{}: {}", task.id, task.description));
    }
    Ok(())
}

pub fn note(output: &Output, document: &Path, id: &str, text: &str) -> Result<()> {
    require_text(text, "Note")?;
    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    ws.tasks.add_note(&id, text, Utc::now())?;
    ws.save()?;

    output.success(&format!("Added note to #{}", id));
    Ok(())
}

pub fn note_update(output: &Output, document: &Path, id: &str, text: &str) -> Result<()> {
    require_text(text, "Note")?;
    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    ws.tasks.replace_notes(&id, text, Utc::now())?;
    ws.save()?;

    output.success(&format!("Updated notes on #{}", id));
    Ok(())
}

pub fn note_clear(output: &Output, document: &Path, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let mut ws = Workspace::open(document)?;
    ws.tasks.clear_notes(&id, Utc::now())?;
    ws.save()?;

    output.success(&format!("Cleared notes on #{}", id));
    Ok(())
}

pub fn relate(
    output: &Output,
    document: &Path,
    id: &str,
    kind: RelationKind,
    targets: &[String],
) -> Result<()> {
    let id = parse_id(id)?;
    let targets = parse_ids(targets)?;
    if targets.contains(&id) {
        bail!("Task #{} cannot be related to itself", id);
    }

    let mut ws = Workspace::open(document)?;
    ws.session.relate(&ws.tasks, &id, kind, targets.clone())?;
    ws.save()?;

    if targets.is_empty() {
        output.success(&format!("Removed {} from #{}", kind, id));
    } else {
        output.success(&format!("#{} {} {}", id, kind, hashes(&targets)));
    }
    Ok(())
}

pub fn empty_trash(output: &Output, document: &Path) -> Result<()> {
    let mut ws = Workspace::open(document)?;

    let removed = ws.tasks.purge_expired(Utc::now());
    if removed.is_empty() {
        output.changed("Trash is empty", &[]);
        return Ok(());
    }

    let ids: Vec<TaskId> = removed.iter().map(|t| t.id.clone()).collect();
    ws.session.forget_tasks(&ids);
    ws.save()?;

    output.changed(
        &format!("Removed {} expired task(s): {}", ids.len(), hashes(&ids)),
        &id_strings(&ids),
    );
    Ok(())
}
