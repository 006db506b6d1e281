//! Hierarchical task identifiers
//!
//! ID Format:
//! - Root tasks: `{n}` (e.g., `12`)
//! - Subtasks: `{parent-id}.{n}` (e.g., `12.3`, `12.3.1`), unbounded depth
//!
//! Every segment is a positive integer. Ordering is numeric per segment, so
//! `10.2` sorts before `10.10` and `10.10` before `100`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid task ID format: expected '{{n}}' or '{{n}}.{{m}}...', got '{0}'")]
    InvalidTaskId(String),

    #[error("Invalid sequence number: {0}")]
    InvalidSequence(String),

    #[error("No sequence numbers left after {0}")]
    SequenceExhausted(u32),
}

/// Dot-separated hierarchical task ID
///
/// The derived ordering compares segment vectors element by element, which
/// is exactly the numeric tuple order the document uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    segments: Vec<u32>,
}

impl TaskId {
    /// Creates a root task ID
    pub fn root(sequence: u32) -> Self {
        Self {
            segments: vec![sequence],
        }
    }

    /// Returns the numeric segments (e.g., `[12, 3]` for `12.3`)
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Returns the nesting depth (0 for root tasks)
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    /// Returns true if this ID has no parent
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Returns the first segment, which identifies the root family
    pub fn root_sequence(&self) -> u32 {
        self.segments[0]
    }

    /// Returns the last segment
    pub fn sequence(&self) -> u32 {
        *self.segments.last().unwrap_or(&0)
    }

    /// Returns the parent task ID, or None for root tasks
    pub fn parent(&self) -> Option<TaskId> {
        if self.is_root() {
            return None;
        }
        Some(TaskId {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Creates a child ID one level below this one
    pub fn child(&self, sequence: u32) -> TaskId {
        let mut segments = self.segments.clone();
        segments.push(sequence);
        TaskId { segments }
    }

    /// Returns true if `other` is exactly one level below this ID
    pub fn is_parent_of(&self, other: &TaskId) -> bool {
        other.segments.len() == self.segments.len() + 1 && other.segments.starts_with(&self.segments)
    }

    /// Returns true if `other` is anywhere below this ID
    pub fn is_ancestor_of(&self, other: &TaskId) -> bool {
        other.segments.len() > self.segments.len() && other.segments.starts_with(&self.segments)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Accept the `#12` spelling users copy out of the document
        let s = s.strip_prefix('#').unwrap_or(s);

        if s.is_empty() {
            return Err(IdError::InvalidTaskId(s.to_string()));
        }

        let mut segments = Vec::new();
        for part in s.split('.') {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(IdError::InvalidTaskId(s.to_string()));
            }
            let seq: u32 = part
                .parse()
                .map_err(|_| IdError::InvalidSequence(part.to_string()))?;
            if seq == 0 {
                return Err(IdError::InvalidSequence(part.to_string()));
            }
            segments.push(seq);
        }

        Ok(Self { segments })
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Allocates IDs for new root tasks
///
/// The store treats the result as an opaque string and only requires that it
/// parses as a [`TaskId`].
pub trait IdAllocator {
    fn allocate_next_id(
        &self,
        current_max_numeric_id: u32,
        external_serial_hint: u32,
    ) -> Result<String, IdError>;
}

/// Hands out `max(current max, serial hint) + 1`
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialAllocator;

impl IdAllocator for SequentialAllocator {
    fn allocate_next_id(
        &self,
        current_max_numeric_id: u32,
        external_serial_hint: u32,
    ) -> Result<String, IdError> {
        let last = current_max_numeric_id.max(external_serial_hint);
        last.checked_add(1)
            .map(|next| next.to_string())
            .ok_or(IdError::SequenceExhausted(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn task_id_parses_correctly() {
        let parsed = id("12.3.1");
        assert_eq!(parsed.segments(), &[12, 3, 1]);
        assert_eq!(parsed.depth(), 2);
        assert_eq!(parsed.to_string(), "12.3.1");
    }

    #[test]
    fn task_id_accepts_hash_prefix() {
        assert_eq!(id("#7"), TaskId::root(7));
    }

    #[test]
    fn task_id_rejects_invalid_format() {
        assert!("".parse::<TaskId>().is_err());
        assert!("1..2".parse::<TaskId>().is_err());
        assert!("1.".parse::<TaskId>().is_err());
        assert!("a-1".parse::<TaskId>().is_err());
        assert!("0".parse::<TaskId>().is_err());
        assert!("3.0".parse::<TaskId>().is_err());
    }

    #[test]
    fn parent_chain() {
        let sub = id("4.2.9");
        assert_eq!(sub.parent(), Some(id("4.2")));
        assert_eq!(id("4.2").parent(), Some(id("4")));
        assert_eq!(id("4").parent(), None);
        assert!(id("4").is_root());
    }

    #[test]
    fn child_and_ancestry() {
        let parent = id("3");
        let child = parent.child(2);
        assert_eq!(child, id("3.2"));
        assert!(parent.is_parent_of(&child));
        assert!(parent.is_ancestor_of(&id("3.2.1")));
        assert!(!parent.is_parent_of(&id("3.2.1")));
        assert!(!parent.is_ancestor_of(&id("30.1")));
        assert!(!parent.is_ancestor_of(&parent));
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        let mut ids: Vec<TaskId> = ["100", "10.10", "2", "10.2", "10", "9", "10.1"]
            .iter()
            .map(|s| id(s))
            .collect();
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(rendered, vec!["2", "9", "10", "10.1", "10.2", "10.10", "100"]);
    }

    #[test]
    fn serde_roundtrip_task_id() {
        let original = id("5.1");
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, "\"5.1\"");
        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn sequential_allocator_uses_larger_source() {
        let alloc = SequentialAllocator;
        assert_eq!(alloc.allocate_next_id(4, 0).unwrap(), "5");
        assert_eq!(alloc.allocate_next_id(4, 9).unwrap(), "10");
        assert_eq!(alloc.allocate_next_id(0, 0).unwrap(), "1");
    }

    #[test]
    fn sequential_allocator_stops_at_u32_max() {
        assert_eq!(
            SequentialAllocator.allocate_next_id(u32::MAX, 0),
            Err(IdError::SequenceExhausted(u32::MAX))
        );
    }
}
