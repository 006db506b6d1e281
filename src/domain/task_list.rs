//! Task collection and hierarchical operations
//!
//! [`TaskList`] treats its tasks as a forest keyed by dotted IDs. Status
//! changes go through [`lifecycle::apply`]; cascades walk a task and every
//! descendant parent-first and converge each one onto the operation's result
//! instead of stopping at a parent that already looks done.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use super::id::TaskId;
use super::lifecycle::{self, LifecycleError, Operation};
use super::task::{normalize_tag, Task, TaskStatus, IN_PROGRESS_TAG};

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("Task not found: #{0}")]
    TaskNotFound(TaskId),

    #[error("Parent task not found: #{0}")]
    ParentNotFound(TaskId),

    #[error("Task already exists: #{0}")]
    DuplicateTask(TaskId),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Task #{0} has no notes to operate on")]
    EmptyOperationTarget(TaskId),

    #[error("No subtask numbers left under #{0}")]
    SequenceExhausted(TaskId),

    #[error("Invalid tag '{0}': a tag needs at least one character and no whitespace or backticks")]
    InvalidTag(String),
}

/// Filter for [`TaskList::list`]
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub tag: Option<String>,
}

/// Ordered collection of tasks
///
/// Order is insertion order; the serializer decides document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already-parsed tasks without validating the hierarchy
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Returns the task or `TaskNotFound`
    pub fn require(&self, id: &TaskId) -> Result<&Task, EngineError> {
        self.get(id).ok_or_else(|| EngineError::TaskNotFound(id.clone()))
    }

    fn require_mut(&mut self, id: &TaskId) -> Result<&mut Task, EngineError> {
        self.tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))
    }

    /// Inserts a task whose parent (if any) is already present
    pub fn insert(&mut self, task: Task) -> Result<&Task, EngineError> {
        if self.contains(&task.id) {
            return Err(EngineError::DuplicateTask(task.id));
        }
        if let Some(parent) = task.parent_id() {
            if !self.contains(&parent) {
                return Err(EngineError::ParentNotFound(parent));
            }
        }
        self.tasks.push(task);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    /// Largest root sequence in use, across every status
    pub fn max_root_sequence(&self) -> u32 {
        self.tasks
            .iter()
            .map(|t| t.id.root_sequence())
            .max()
            .unwrap_or(0)
    }

    /// Adds a root task under an ID handed out by the ID allocator
    pub fn add_task(
        &mut self,
        id: TaskId,
        description: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        let tags = checked_tags(tags)?;
        let task = Task::new(id, description.trim(), now).with_tags(tags);
        self.insert(task)
    }

    /// Returns tasks exactly one level below `id`, in collection order
    pub fn get_children(&self, id: &TaskId) -> Vec<&Task> {
        self.tasks.iter().filter(|t| id.is_parent_of(&t.id)).collect()
    }

    /// Returns every descendant ID of `id` in parent-first order
    pub fn descendants(&self, id: &TaskId) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| id.is_ancestor_of(&t.id))
            .map(|t| t.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Next free child ID: one past the largest existing child suffix
    pub fn next_child_id(&self, parent: &TaskId) -> Result<TaskId, EngineError> {
        let max_seq = self
            .get_children(parent)
            .iter()
            .map(|t| t.id.sequence())
            .max()
            .unwrap_or(0);
        max_seq
            .checked_add(1)
            .map(|seq| parent.child(seq))
            .ok_or_else(|| EngineError::SequenceExhausted(parent.clone()))
    }

    /// Adds a subtask under `parent`
    pub fn add_subtask(
        &mut self,
        parent: &TaskId,
        description: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        if !self.contains(parent) {
            return Err(EngineError::ParentNotFound(parent.clone()));
        }
        let id = self.next_child_id(parent)?;
        self.add_task(id, description, tags, now)
    }

    /// Applies a single transition to one task
    pub fn transition(
        &mut self,
        id: &TaskId,
        op: Operation,
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        let pos = self
            .position(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))?;
        self.tasks[pos] = lifecycle::apply(&self.tasks[pos], op, now)?;
        Ok(&self.tasks[pos])
    }

    /// Applies `op` to `id` and all of its descendants, parent first.
    ///
    /// Tasks already in the operation's result state are left alone, so a
    /// cascade can be re-run on a half-migrated tree. Descendants whose
    /// status does not permit the operation are skipped. Returns the IDs that
    /// changed.
    pub fn cascade(
        &mut self,
        id: &TaskId,
        op: Operation,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>, EngineError> {
        let mut changed = Vec::new();

        let parent = self.require(id)?;
        if !op.is_satisfied_by(parent.status) {
            self.transition(id, op, now)?;
            changed.push(id.clone());
        }

        for child_id in self.descendants(id) {
            let Some(pos) = self.position(&child_id) else {
                continue;
            };
            let status = self.tasks[pos].status;
            if op.is_satisfied_by(status) {
                continue;
            }
            if !op.permits(status) {
                tracing::debug!(task = %child_id, op = op.name(), %status, "cascade skipped task");
                continue;
            }
            self.tasks[pos] = lifecycle::apply(&self.tasks[pos], op, now)?;
            changed.push(child_id);
        }

        Ok(changed)
    }

    fn apply_maybe_cascading(
        &mut self,
        id: &TaskId,
        op: Operation,
        include_subtasks: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>, EngineError> {
        if include_subtasks {
            self.cascade(id, op, now)
        } else {
            self.transition(id, op, now)?;
            Ok(vec![id.clone()])
        }
    }

    /// Marks a pending task completed
    pub fn complete(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<&Task, EngineError> {
        self.transition(id, Operation::Complete, now)
    }

    /// Reverts a completed task to pending
    pub fn undo(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<&Task, EngineError> {
        self.transition(id, Operation::Undo, now)
    }

    /// Archives a task, enforcing the reason policy on the task itself
    pub fn archive(
        &mut self,
        id: &TaskId,
        reason: Option<&str>,
        include_subtasks: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>, EngineError> {
        let task = self.require(id)?;
        if task.status != TaskStatus::Archived || !include_subtasks {
            lifecycle::check_archive_policy(task, reason)?;
        }
        self.apply_maybe_cascading(id, Operation::Archive, include_subtasks, now)
    }

    /// Soft-deletes a task, expiring after `retention`
    pub fn delete(
        &mut self,
        id: &TaskId,
        retention: Duration,
        include_subtasks: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>, EngineError> {
        self.apply_maybe_cascading(id, Operation::Delete { retention }, include_subtasks, now)
    }

    /// Restores an archived or deleted task
    pub fn restore(
        &mut self,
        id: &TaskId,
        include_subtasks: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>, EngineError> {
        self.apply_maybe_cascading(id, Operation::Restore, include_subtasks, now)
    }

    /// Tags a pending task as in progress. Idempotent.
    pub fn start(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<&Task, EngineError> {
        let task = self.require_mut(id)?;
        if task.status != TaskStatus::Pending {
            return Err(LifecycleError::InvalidTransition {
                id: id.clone(),
                operation: "start",
                status: task.status,
            }
            .into());
        }
        if task.tags.insert(IN_PROGRESS_TAG.to_string()) {
            task.updated_at = now;
        }
        Ok(task)
    }

    /// Removes the in-progress marker. Idempotent.
    pub fn stop(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<&Task, EngineError> {
        let task = self.require_mut(id)?;
        if task.tags.remove(IN_PROGRESS_TAG) {
            task.updated_at = now;
        }
        Ok(task)
    }

    /// Replaces description and/or tags; `None` leaves a field unchanged
    pub fn modify(
        &mut self,
        id: &TaskId,
        description: Option<&str>,
        tags: Option<&[String]>,
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        let tags = tags.map(checked_tags).transpose()?;
        let task = self.require_mut(id)?;
        if let Some(description) = description {
            task.description = description.trim().to_string();
        }
        if let Some(tags) = tags {
            task.tags = tags.into_iter().collect::<BTreeSet<_>>();
        }
        task.updated_at = now;
        Ok(task)
    }

    /// Appends one note per line of `text`
    pub fn add_note(
        &mut self,
        id: &TaskId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        let task = self.require_mut(id)?;
        task.notes.extend(split_note(text));
        task.updated_at = now;
        Ok(task)
    }

    /// Replaces all notes with the lines of `text`
    pub fn replace_notes(
        &mut self,
        id: &TaskId,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&Task, EngineError> {
        let task = self.require_mut(id)?;
        if task.notes.is_empty() {
            return Err(EngineError::EmptyOperationTarget(id.clone()));
        }
        task.notes = split_note(text).collect();
        task.updated_at = now;
        Ok(task)
    }

    /// Removes all notes
    pub fn clear_notes(&mut self, id: &TaskId, now: DateTime<Utc>) -> Result<&Task, EngineError> {
        let task = self.require_mut(id)?;
        if task.notes.is_empty() {
            return Err(EngineError::EmptyOperationTarget(id.clone()));
        }
        task.notes.clear();
        task.updated_at = now;
        Ok(task)
    }

    /// Returns matching tasks sorted by ID
    pub fn list(&self, filter: &TaskFilter) -> Vec<&Task> {
        let tag = filter.tag.as_deref().map(normalize_tag);
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| tag.as_ref().map_or(true, |tag| t.tags.contains(tag)))
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Status of every task, for dependency checks
    pub fn statuses(&self) -> HashMap<TaskId, TaskStatus> {
        self.tasks.iter().map(|t| (t.id.clone(), t.status)).collect()
    }

    /// Deleted tasks whose retention window has passed
    pub fn expired_deleted(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.is_expired(now))
            .map(|t| t.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Permanently removes expired deleted tasks with their subtrees.
    ///
    /// A task is only purged if its whole subtree is deleted, so nothing is
    /// left without a parent. Returns the removed tasks in ID order.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Vec<Task> {
        let mut doomed: BTreeSet<TaskId> = BTreeSet::new();

        for id in self.expired_deleted(now) {
            if doomed.contains(&id) {
                continue;
            }
            let subtree = self.descendants(&id);
            let all_deleted = subtree
                .iter()
                .filter_map(|d| self.get(d))
                .all(|t| t.status == TaskStatus::Deleted);
            if !all_deleted {
                tracing::debug!(task = %id, "expired task kept: subtree not deleted");
                continue;
            }
            doomed.insert(id);
            doomed.extend(subtree);
        }

        let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| doomed.contains(&t.id));
        self.tasks = kept;

        let mut removed = removed;
        removed.sort_by(|a, b| a.id.cmp(&b.id));
        removed
    }
}

/// Normalizes user tags, rejecting any the document could not read back
fn checked_tags(tags: &[String]) -> Result<Vec<String>, EngineError> {
    tags.iter()
        .map(|raw| {
            let tag = normalize_tag(raw);
            if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == '`') {
                return Err(EngineError::InvalidTag(raw.clone()));
            }
            Ok(tag)
        })
        .collect()
}

fn split_note(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().map(|l| l.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn sample() -> TaskList {
        let now = Utc::now();
        let mut list = TaskList::new();
        list.add_task(id("1"), "First", &[], now).unwrap();
        list.add_task(id("2"), "Second", &["bug".to_string()], now).unwrap();
        list.add_subtask(&id("2"), "Child A", &[], now).unwrap();
        list.add_subtask(&id("2"), "Child B", &[], now).unwrap();
        list
    }

    #[test]
    fn add_subtask_allocates_next_suffix() {
        let mut list = sample();
        assert_eq!(list.next_child_id(&id("2")).unwrap(), id("2.3"));
        assert_eq!(list.next_child_id(&id("1")).unwrap(), id("1.1"));

        let nested = list.add_subtask(&id("2.1"), "Grandchild", &[], Utc::now()).unwrap();
        assert_eq!(nested.id, id("2.1.1"));
    }

    #[test]
    fn add_subtask_fails_when_suffixes_run_out() {
        let now = Utc::now();
        let mut list = TaskList::new();
        list.add_task(id("1"), "Parent", &[], now).unwrap();
        list.insert(Task::new(id("1.4294967295"), "Last child", now))
            .unwrap();

        assert_eq!(
            list.add_subtask(&id("1"), "One more", &[], now).unwrap_err(),
            EngineError::SequenceExhausted(id("1"))
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn add_subtask_requires_parent() {
        let mut list = sample();
        assert_eq!(
            list.add_subtask(&id("9"), "Nope", &[], Utc::now()).unwrap_err(),
            EngineError::ParentNotFound(id("9"))
        );
        let orphan = Task::new(id("7.1"), "Orphan", Utc::now());
        assert!(matches!(list.insert(orphan), Err(EngineError::ParentNotFound(_))));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut list = sample();
        assert_eq!(
            list.add_task(id("1"), "Again", &[], Utc::now()).unwrap_err(),
            EngineError::DuplicateTask(id("1"))
        );
    }

    #[test]
    fn children_are_one_level_deep() {
        let mut list = sample();
        list.add_subtask(&id("2.1"), "Grandchild", &[], Utc::now()).unwrap();

        let children: Vec<String> = list
            .get_children(&id("2"))
            .iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(children, vec!["2.1", "2.2"]);
        assert_eq!(list.descendants(&id("2")), vec![id("2.1"), id("2.1.1"), id("2.2")]);
    }

    #[test]
    fn unknown_task_is_reported() {
        let mut list = sample();
        assert_eq!(
            list.complete(&id("42"), Utc::now()).unwrap_err(),
            EngineError::TaskNotFound(id("42"))
        );
    }

    #[test]
    fn undo_pending_fails() {
        let mut list = sample();
        let err = list.undo(&id("1"), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn archive_requires_reason_for_pending() {
        let mut list = sample();
        let now = Utc::now();
        assert_eq!(
            list.archive(&id("1"), None, true, now).unwrap_err(),
            EngineError::Lifecycle(LifecycleError::ArchiveRequiresReason(id("1")))
        );
        list.archive(&id("1"), Some("no longer needed"), true, now).unwrap();
        assert_eq!(list.get(&id("1")).unwrap().status, TaskStatus::Archived);
    }

    #[test]
    fn archive_cascades_parent_first() {
        let mut list = sample();
        let now = Utc::now();
        list.complete(&id("2"), now).unwrap();

        let changed = list.archive(&id("2"), None, true, now).unwrap();
        assert_eq!(changed, vec![id("2"), id("2.1"), id("2.2")]);
        for t in ["2", "2.1", "2.2"] {
            assert_eq!(list.get(&id(t)).unwrap().status, TaskStatus::Archived);
        }
        assert_eq!(list.get(&id("1")).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn archive_without_subtasks_leaves_children() {
        let mut list = sample();
        let now = Utc::now();
        list.complete(&id("2"), now).unwrap();
        list.archive(&id("2"), None, false, now).unwrap();
        assert_eq!(list.get(&id("2.1")).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn restore_cascade_is_idempotent() {
        let now = Utc::now();

        // Restore everything at once
        let mut all_at_once = sample();
        all_at_once.complete(&id("2"), now).unwrap();
        all_at_once.archive(&id("2"), None, true, now).unwrap();
        all_at_once.restore(&id("2"), true, now).unwrap();

        // Restore only the parent, then re-run the cascade
        let mut partial = sample();
        partial.complete(&id("2"), now).unwrap();
        partial.archive(&id("2"), None, true, now).unwrap();
        partial.transition(&id("2"), Operation::Restore, now).unwrap();
        assert_eq!(partial.get(&id("2.1")).unwrap().status, TaskStatus::Archived);

        let changed = partial.restore(&id("2"), true, now).unwrap();
        assert_eq!(changed, vec![id("2.1"), id("2.2")]);

        for t in ["2", "2.1", "2.2"] {
            assert_eq!(
                partial.get(&id(t)).unwrap().status,
                all_at_once.get(&id(t)).unwrap().status
            );
        }
        assert_eq!(partial.get(&id("2")).unwrap().status, TaskStatus::Completed);
        assert_eq!(partial.get(&id("2.1")).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn delete_cascade_sets_expiry() {
        let mut list = sample();
        let now = Utc::now();
        list.delete(&id("2"), Duration::days(30), true, now).unwrap();
        let child = list.get(&id("2.2")).unwrap();
        assert_eq!(child.status, TaskStatus::Deleted);
        assert_eq!(child.expires_at, Some(now + Duration::days(30)));
    }

    #[test]
    fn start_and_stop_toggle_marker() {
        let mut list = sample();
        let now = Utc::now();
        list.start(&id("1"), now).unwrap();
        list.start(&id("1"), now).unwrap();
        assert!(list.get(&id("1")).unwrap().is_in_progress());
        assert_eq!(list.get(&id("1")).unwrap().tags.len(), 1);

        list.stop(&id("1"), now).unwrap();
        list.stop(&id("1"), now).unwrap();
        assert!(!list.get(&id("1")).unwrap().is_in_progress());

        list.complete(&id("1"), now).unwrap();
        assert!(list.start(&id("1"), now).is_err());
    }

    #[test]
    fn modify_is_partial() {
        let mut list = sample();
        let now = Utc::now();
        list.modify(&id("2"), Some("Renamed"), None, now).unwrap();
        let task = list.get(&id("2")).unwrap();
        assert_eq!(task.description, "Renamed");
        assert!(task.tags.contains("bug"));

        list.modify(&id("2"), None, Some(&["#ui".to_string()]), now).unwrap();
        let task = list.get(&id("2")).unwrap();
        assert_eq!(task.description, "Renamed");
        assert_eq!(task.tags.iter().collect::<Vec<_>>(), vec!["ui"]);
    }

    #[test]
    fn tags_that_cannot_be_written_are_rejected() {
        let mut list = sample();
        let now = Utc::now();

        for bad in ["needs review", "", "#", "a`b"] {
            assert_eq!(
                list.add_task(id("3"), "Tagged", &[bad.to_string()], now).unwrap_err(),
                EngineError::InvalidTag(bad.to_string())
            );
        }
        assert!(!list.contains(&id("3")));

        assert_eq!(
            list.modify(&id("2"), Some("Renamed"), Some(&["two words".to_string()]), now)
                .unwrap_err(),
            EngineError::InvalidTag("two words".to_string())
        );
        let task = list.get(&id("2")).unwrap();
        assert_eq!(task.description, "Second");
        assert!(task.tags.contains("bug"));

        let task = list.add_task(id("3"), "Tagged", &["#needs-review".to_string()], now).unwrap();
        assert!(task.tags.contains("needs-review"));
    }

    #[test]
    fn add_note_splits_lines() {
        let mut list = sample();
        list.add_note(&id("1"), "Line 1\nLine 2\nLine 3", Utc::now()).unwrap();
        assert_eq!(list.get(&id("1")).unwrap().notes, vec!["Line 1", "Line 2", "Line 3"]);

        list.add_note(&id("1"), "Line 4", Utc::now()).unwrap();
        assert_eq!(list.get(&id("1")).unwrap().notes.len(), 4);
    }

    #[test]
    fn note_replace_and_clear_need_existing_notes() {
        let mut list = sample();
        let now = Utc::now();
        assert_eq!(
            list.replace_notes(&id("1"), "x", now).unwrap_err(),
            EngineError::EmptyOperationTarget(id("1"))
        );
        assert_eq!(
            list.clear_notes(&id("1"), now).unwrap_err(),
            EngineError::EmptyOperationTarget(id("1"))
        );

        list.add_note(&id("1"), "old", now).unwrap();
        list.replace_notes(&id("1"), "new a\nnew b", now).unwrap();
        assert_eq!(list.get(&id("1")).unwrap().notes, vec!["new a", "new b"]);

        list.clear_notes(&id("1"), now).unwrap();
        assert!(list.get(&id("1")).unwrap().notes.is_empty());
    }

    #[test]
    fn list_filters_by_status_and_tag() {
        let mut list = sample();
        list.complete(&id("1"), Utc::now()).unwrap();

        let completed = list.list(&TaskFilter {
            status: Some(TaskStatus::Completed),
            tag: None,
        });
        assert_eq!(completed.len(), 1);

        let bugs = list.list(&TaskFilter {
            status: None,
            tag: Some("#bug".to_string()),
        });
        assert_eq!(bugs.len(), 1);
        assert_eq!(bugs[0].id, id("2"));
    }

    #[test]
    fn purge_removes_expired_subtrees() {
        let mut list = sample();
        let then = Utc::now() - Duration::days(40);
        list.delete(&id("2"), Duration::days(30), true, then).unwrap();
        list.delete(&id("1"), Duration::days(30), true, Utc::now()).unwrap();

        assert_eq!(list.expired_deleted(Utc::now()), vec![id("2"), id("2.1"), id("2.2")]);

        let removed = list.purge_expired(Utc::now());
        assert_eq!(removed.len(), 3);
        assert_eq!(list.len(), 1);
        assert!(list.contains(&id("1")));
    }

    #[test]
    fn purge_keeps_parent_with_live_children() {
        let mut list = sample();
        let then = Utc::now() - Duration::days(40);
        list.delete(&id("2"), Duration::days(30), false, then).unwrap();

        assert!(list.purge_expired(Utc::now()).is_empty());
        assert!(list.contains(&id("2")));
    }

    #[test]
    fn max_root_sequence_spans_all_statuses() {
        let mut list = sample();
        list.delete(&id("2"), Duration::days(30), true, Utc::now()).unwrap();
        assert_eq!(list.max_root_sequence(), 2);
    }
}
