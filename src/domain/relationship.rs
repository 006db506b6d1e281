//! Typed links between tasks
//!
//! Relationships live beside the task tree, not inside it: a task can point at
//! any number of other tasks under each [`RelationKind`]. The document stores
//! them as `id:kind:target target...` lines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::TaskId;

#[derive(Debug, Error, PartialEq)]
pub enum RelationshipError {
    #[error("Unknown relationship kind: {0}")]
    UnknownKind(String),

    #[error("Malformed relationship line: {0}")]
    Malformed(String),
}

/// Fixed relationship vocabulary
///
/// Variants are declared alphabetically by their document spelling so the
/// derived ordering matches the order lines are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Blocks,
    CompletedBy,
    DependsOn,
    DuplicateOf,
    RelatedTo,
}

impl RelationKind {
    pub const ALL: [RelationKind; 5] = [
        RelationKind::Blocks,
        RelationKind::CompletedBy,
        RelationKind::DependsOn,
        RelationKind::DuplicateOf,
        RelationKind::RelatedTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Blocks => "blocks",
            RelationKind::CompletedBy => "completed-by",
            RelationKind::DependsOn => "depends-on",
            RelationKind::DuplicateOf => "duplicate-of",
            RelationKind::RelatedTo => "related-to",
        }
    }

    /// Returns true if this kind orders work (and so must stay acyclic)
    pub fn is_ordering(&self) -> bool {
        matches!(self, RelationKind::DependsOn | RelationKind::Blocks)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = RelationshipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| RelationshipError::UnknownKind(s.to_string()))
    }
}

/// `task_id -> kind -> ordered targets`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships(BTreeMap<TaskId, BTreeMap<RelationKind, Vec<TaskId>>>);

impl Relationships {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Replaces the targets of one kind for a task. An empty target list
    /// removes the entry.
    pub fn set(&mut self, task: TaskId, kind: RelationKind, targets: Vec<TaskId>) {
        let mut unique = Vec::with_capacity(targets.len());
        for t in targets {
            if !unique.contains(&t) {
                unique.push(t);
            }
        }

        if unique.is_empty() {
            self.remove(&task, kind);
            return;
        }
        self.0.entry(task).or_default().insert(kind, unique);
    }

    /// Removes one kind for a task, returning true if something was removed
    pub fn remove(&mut self, task: &TaskId, kind: RelationKind) -> bool {
        let Some(kinds) = self.0.get_mut(task) else {
            return false;
        };
        let removed = kinds.remove(&kind).is_some();
        if kinds.is_empty() {
            self.0.remove(task);
        }
        removed
    }

    /// Drops every relationship from or to `task`
    pub fn forget(&mut self, task: &TaskId) {
        self.0.remove(task);
        for kinds in self.0.values_mut() {
            for targets in kinds.values_mut() {
                targets.retain(|t| t != task);
            }
            kinds.retain(|_, targets| !targets.is_empty());
        }
        self.0.retain(|_, kinds| !kinds.is_empty());
    }

    /// Returns the relationships of one task
    pub fn get(&self, task: &TaskId) -> Option<&BTreeMap<RelationKind, Vec<TaskId>>> {
        self.0.get(task)
    }

    /// Returns the targets of one kind for a task
    pub fn targets(&self, task: &TaskId, kind: RelationKind) -> &[TaskId] {
        self.0
            .get(task)
            .and_then(|k| k.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(task, kind, targets)` sorted by task id then kind
    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, RelationKind, &[TaskId])> {
        self.0.iter().flat_map(|(task, kinds)| {
            kinds
                .iter()
                .map(move |(kind, targets)| (task, *kind, targets.as_slice()))
        })
    }

    /// Renders the relationship lines in document order
    pub fn to_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(task, kind, targets)| format_line(task, kind, targets))
            .collect()
    }
}

/// Parses one `id:kind:target target...` line
pub fn parse_line(line: &str) -> Result<(TaskId, RelationKind, Vec<TaskId>), RelationshipError> {
    let malformed = || RelationshipError::Malformed(line.to_string());
    let mut parts = line.trim().splitn(3, ':');

    let task: TaskId = parts
        .next()
        .ok_or_else(malformed)?
        .parse()
        .map_err(|_| malformed())?;
    let kind: RelationKind = parts.next().ok_or_else(malformed)?.parse()?;
    let targets = parts
        .next()
        .ok_or_else(malformed)?
        .split_whitespace()
        .map(|t| t.parse::<TaskId>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()?;

    if targets.is_empty() {
        return Err(malformed());
    }
    Ok((task, kind, targets))
}

fn format_line(task: &TaskId, kind: RelationKind, targets: &[TaskId]) -> String {
    let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
    format!("{}:{}:{}", task, kind, targets.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn parses_relationship_line() {
        let (task, kind, targets) = parse_line("12:depends-on:3 4.1").unwrap();
        assert_eq!(task, id("12"));
        assert_eq!(kind, RelationKind::DependsOn);
        assert_eq!(targets, vec![id("3"), id("4.1")]);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_line("12:depends-on:"),
            Err(RelationshipError::Malformed(_))
        ));
        assert!(matches!(
            parse_line("x:blocks:2"),
            Err(RelationshipError::Malformed(_))
        ));
        assert_eq!(
            parse_line("1:follows:2"),
            Err(RelationshipError::UnknownKind("follows".to_string()))
        );
        assert!(parse_line("just text").is_err());
    }

    #[test]
    fn set_deduplicates_and_replaces() {
        let mut rels = Relationships::new();
        rels.set(id("1"), RelationKind::Blocks, vec![id("2"), id("3"), id("2")]);
        assert_eq!(rels.targets(&id("1"), RelationKind::Blocks), &[id("2"), id("3")]);

        rels.set(id("1"), RelationKind::Blocks, vec![id("4")]);
        assert_eq!(rels.targets(&id("1"), RelationKind::Blocks), &[id("4")]);

        rels.set(id("1"), RelationKind::Blocks, vec![]);
        assert!(rels.is_empty());
    }

    #[test]
    fn lines_sorted_by_task_then_kind() {
        let mut rels = Relationships::new();
        rels.set(id("10"), RelationKind::RelatedTo, vec![id("1")]);
        rels.set(id("2"), RelationKind::RelatedTo, vec![id("1")]);
        rels.set(id("2"), RelationKind::Blocks, vec![id("10")]);

        assert_eq!(
            rels.to_lines(),
            vec!["2:blocks:10", "2:related-to:1", "10:related-to:1"]
        );
    }

    #[test]
    fn forget_removes_both_directions() {
        let mut rels = Relationships::new();
        rels.set(id("1"), RelationKind::DependsOn, vec![id("2")]);
        rels.set(id("3"), RelationKind::DependsOn, vec![id("1"), id("2")]);

        rels.forget(&id("2"));
        assert!(rels.get(&id("1")).is_none());
        assert_eq!(rels.targets(&id("3"), RelationKind::DependsOn), &[id("1")]);
    }
}
