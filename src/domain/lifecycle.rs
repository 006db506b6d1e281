//! Task status state machine
//!
//! ```text
//! Pending --complete--> Completed --archive--> Archived
//!    ^  <----undo-------    |                     |
//!    |                      v                     v
//!    +------restore----- Deleted <---delete--- (any)
//! ```
//!
//! Transitions are pure: [`apply`] takes a task and returns the transitioned
//! copy, leaving the input untouched. `restore` lands on `Completed` when the
//! task had been completed before, otherwise on `Pending`.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::id::TaskId;
use super::task::{Task, TaskStatus, IN_PROGRESS_TAG};

#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("Cannot {operation} task #{id}: task is {status}")]
    InvalidTransition {
        id: TaskId,
        operation: &'static str,
        status: TaskStatus,
    },

    #[error("Task #{0} is not completed; archiving it requires a reason")]
    ArchiveRequiresReason(TaskId),
}

/// A status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Complete,
    Undo,
    Archive,
    /// Retention window is supplied by the caller (configuration)
    Delete { retention: Duration },
    Restore,
}

impl Operation {
    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Complete => "complete",
            Operation::Undo => "undo",
            Operation::Archive => "archive",
            Operation::Delete { .. } => "delete",
            Operation::Restore => "restore",
        }
    }

    /// Returns true if `status` is a permitted source state
    pub fn permits(&self, status: TaskStatus) -> bool {
        match self {
            Operation::Complete => status == TaskStatus::Pending,
            Operation::Undo => status == TaskStatus::Completed,
            Operation::Archive => matches!(status, TaskStatus::Pending | TaskStatus::Completed),
            Operation::Delete { .. } => true,
            Operation::Restore => matches!(status, TaskStatus::Archived | TaskStatus::Deleted),
        }
    }

    /// Returns true if a task in `status` already looks like the result of
    /// this operation. Cascades use this to converge without erroring.
    pub fn is_satisfied_by(&self, status: TaskStatus) -> bool {
        match self {
            Operation::Complete => status == TaskStatus::Completed,
            Operation::Undo => status == TaskStatus::Pending,
            Operation::Archive => status == TaskStatus::Archived,
            Operation::Delete { .. } => status == TaskStatus::Deleted,
            Operation::Restore => status.is_active(),
        }
    }
}

/// Archive policy: completed tasks archive freely, pending ones need a reason
pub fn archive_allowed(task: &Task, reason: Option<&str>) -> bool {
    match task.status {
        TaskStatus::Completed => true,
        TaskStatus::Pending => reason.is_some_and(|r| !r.trim().is_empty()),
        _ => false,
    }
}

/// Checks the archive policy, returning the error the command layer reports
pub fn check_archive_policy(task: &Task, reason: Option<&str>) -> Result<(), LifecycleError> {
    if archive_allowed(task, reason) {
        return Ok(());
    }
    if task.status == TaskStatus::Pending {
        Err(LifecycleError::ArchiveRequiresReason(task.id.clone()))
    } else {
        Err(invalid(task, Operation::Archive))
    }
}

/// Applies `op` to `task`, returning the transitioned copy
pub fn apply(task: &Task, op: Operation, now: DateTime<Utc>) -> Result<Task, LifecycleError> {
    if !op.permits(task.status) {
        return Err(invalid(task, op));
    }

    let mut next = task.clone();
    next.updated_at = now;

    match op {
        Operation::Complete => {
            next.status = TaskStatus::Completed;
            next.completed_at = Some(now);
            next.tags.remove(IN_PROGRESS_TAG);
        }
        Operation::Undo => {
            next.status = TaskStatus::Pending;
            next.completed_at = None;
        }
        Operation::Archive => {
            next.status = TaskStatus::Archived;
            next.archived_at = Some(now);
            next.tags.remove(IN_PROGRESS_TAG);
        }
        Operation::Delete { retention } => {
            next.status = TaskStatus::Deleted;
            next.deleted_at = Some(now);
            next.expires_at = Some(now + retention);
            next.tags.remove(IN_PROGRESS_TAG);
        }
        Operation::Restore => {
            next.status = if next.completed_at.is_some() {
                TaskStatus::Completed
            } else {
                TaskStatus::Pending
            };
            next.archived_at = None;
            next.deleted_at = None;
            next.expires_at = None;
        }
    }

    Ok(next)
}

fn invalid(task: &Task, op: Operation) -> LifecycleError {
    LifecycleError::InvalidTransition {
        id: task.id.clone(),
        operation: op.name(),
        status: task.status,
    }
}
