//! Formatting captured from a parsed document
//!
//! A [`StructureSnapshot`] holds everything about a document that is not a
//! task: header and footer text, the literal spelling of each section
//! heading, blank-line habits, comments between tasks, metadata prose, the
//! line ending and the original checkbox spelling of task lines. The serializer replays it so that an
//! untouched document comes back unchanged.
//!
//! Snapshots are never mutated after parsing. A session keeps the same one
//! across writes until the file changes underneath it.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::grammar::SectionKind;
use crate::domain::{Task, TaskId};

/// Where a run of unrecognised lines sits in its section
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterleaveAnchor {
    /// Directly under the section heading, before the first task
    SectionStart(SectionKind),
    /// After the task line and notes of this task
    AfterTask(TaskId),
}

/// Heading and blank-line layout of one task section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    pub kind: SectionKind,
    /// Heading line exactly as written
    pub heading: String,
    pub blank_after_heading: bool,
    /// Blank line between consecutive root tasks
    pub blank_between_tasks: bool,
    /// Blank line between the section's last line and whatever follows
    pub blank_after_section: bool,
}

impl SectionLayout {
    /// Layout used for sections the document does not have yet
    pub fn default_for(kind: SectionKind) -> Self {
        Self {
            kind,
            heading: kind.default_heading().to_string(),
            blank_after_heading: kind == SectionKind::Tasks,
            blank_between_tasks: kind == SectionKind::Tasks,
            blank_after_section: true,
        }
    }
}

/// Lines of the metadata section around the relationship block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataLayout {
    /// Lines before the block, heading included
    pub preamble: Vec<String>,
    /// Whether the document had a relationship block at all
    pub had_block: bool,
    /// Block lines that are not relationships, kept inside the block
    pub unparsed: Vec<String>,
    /// Lines after the block
    pub trailer: Vec<String>,
}

impl MetadataLayout {
    /// Explanatory header written when the document gains its first relationship
    pub fn generated() -> Self {
        Self {
            preamble: vec![
                super::grammar::METADATA_HEADING.to_string(),
                String::new(),
                "Task relationships and dependencies (managed by todo-md).".to_string(),
                "View with: `todo-md show <task-id>`".to_string(),
                String::new(),
            ],
            had_block: false,
            unparsed: Vec::new(),
            trailer: Vec::new(),
        }
    }
}

/// Checkbox of a line read from the Deleted section, with the dates it had
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedGlyph {
    pub glyph: char,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DeletedGlyph {
    /// True while the task still carries the deletion it was read with
    pub fn applies_to(&self, task: &Task) -> bool {
        self.deleted_at == task.deleted_at && self.expires_at == task.expires_at
    }
}

/// One top-level region of the document, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Section(SectionLayout),
    Metadata(MetadataLayout),
}

/// Non-semantic structure of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureSnapshot {
    /// Lines before the first section, verbatim
    pub header_lines: Vec<String>,

    /// Sections and metadata in the order the document had them
    pub blocks: Vec<Block>,

    /// Unrecognised lines inside task sections, each run preceded by the
    /// blank lines that stood before it
    pub interleaved: BTreeMap<InterleaveAnchor, Vec<String>>,

    /// Checkbox of tasks read from the Deleted section
    pub deleted_glyphs: BTreeMap<TaskId, DeletedGlyph>,

    /// Tasks whose checked box was written `[X]`
    pub upper_checked: BTreeSet<TaskId>,

    /// Footer lines, or `None` to generate the default footer
    pub footer: Option<Vec<String>>,

    pub trailing_newline: bool,

    /// `"\n"` or `"\r\n"`, taken from the first line break
    pub line_ending: &'static str,
}

impl StructureSnapshot {
    /// Snapshot for a document that has never been written
    pub fn new_document() -> Self {
        Self {
            header_lines: vec![
                "# Task List".to_string(),
                String::new(),
                "> Maintained by `todo-md`. Hand edits are preserved.".to_string(),
                String::new(),
            ],
            blocks: vec![Block::Section(SectionLayout::default_for(SectionKind::Tasks))],
            interleaved: BTreeMap::new(),
            deleted_glyphs: BTreeMap::new(),
            upper_checked: BTreeSet::new(),
            footer: None,
            trailing_newline: true,
            line_ending: "\n",
        }
    }

    /// An empty snapshot, as produced by parsing an empty file
    pub fn empty() -> Self {
        Self {
            header_lines: Vec::new(),
            blocks: Vec::new(),
            interleaved: BTreeMap::new(),
            deleted_glyphs: BTreeMap::new(),
            upper_checked: BTreeSet::new(),
            footer: None,
            trailing_newline: true,
            line_ending: "\n",
        }
    }

    /// Layout recorded for a section, if the document had it
    pub fn section(&self, kind: SectionKind) -> Option<&SectionLayout> {
        self.blocks.iter().find_map(|b| match b {
            Block::Section(layout) if layout.kind == kind => Some(layout),
            _ => None,
        })
    }

    pub fn metadata(&self) -> Option<&MetadataLayout> {
        self.blocks.iter().find_map(|b| match b {
            Block::Metadata(meta) => Some(meta),
            _ => None,
        })
    }

    pub fn interleaved_at(&self, anchor: &InterleaveAnchor) -> &[String] {
        self.interleaved
            .get(anchor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for StructureSnapshot {
    fn default() -> Self {
        Self::new_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_tasks_section() {
        let snapshot = StructureSnapshot::new_document();
        let tasks = snapshot.section(SectionKind::Tasks).unwrap();
        assert_eq!(tasks.heading, "## Tasks");
        assert!(tasks.blank_after_heading);
        assert!(snapshot.section(SectionKind::Archived).is_none());
        assert!(snapshot.metadata().is_none());
        assert!(snapshot.footer.is_none());
    }

    #[test]
    fn missing_anchor_yields_no_lines() {
        let snapshot = StructureSnapshot::empty();
        assert!(snapshot
            .interleaved_at(&InterleaveAnchor::AfterTask(TaskId::root(1)))
            .is_empty());
    }
}
