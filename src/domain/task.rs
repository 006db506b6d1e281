//! Task domain model
//!
//! A task is one line of the document plus the notes beneath it. Tasks form a
//! forest keyed by their dotted [`TaskId`]; the parent of `4.2` is `4`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::id::TaskId;

/// Tag marking a task as being worked on
pub const IN_PROGRESS_TAG: &str = "inprogress";

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Archived,
    Deleted,
}

impl TaskStatus {
    /// Returns the lowercase name used in messages and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
            TaskStatus::Deleted => "deleted",
        }
    }

    /// Returns true if the task lives in the document's Tasks section
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "archived" => Ok(TaskStatus::Archived),
            "deleted" => Ok(TaskStatus::Deleted),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Hierarchical identifier
    pub id: TaskId,

    /// Free text with tag markup stripped out
    pub description: String,

    /// Current status
    pub status: TaskStatus,

    /// Tags without the leading `#`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Notes in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a new pending task
    pub fn new(id: TaskId, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: description.into(),
            status: TaskStatus::Pending,
            tags: BTreeSet::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            archived_at: None,
            deleted_at: None,
            expires_at: None,
        }
    }

    /// Builder-style tag assignment
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(|t| normalize_tag(&t.into())).collect();
        self
    }

    /// Returns the parent ID, or None for a root task
    pub fn parent_id(&self) -> Option<TaskId> {
        self.id.parent()
    }

    /// Returns true if the task carries the in-progress marker
    pub fn is_in_progress(&self) -> bool {
        self.tags.contains(IN_PROGRESS_TAG)
    }

    /// The timestamp that orders this task inside its section, if any
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        match self.status {
            TaskStatus::Archived => self.archived_at,
            TaskStatus::Deleted => self.deleted_at,
            TaskStatus::Completed => self.completed_at,
            TaskStatus::Pending => None,
        }
    }

    /// Returns true if the task was deleted and its retention window has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Deleted && self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// Strips a leading `#` and surrounding whitespace from user-supplied tags
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim();
    tag.strip_prefix('#').unwrap_or(tag).to_string()
}
