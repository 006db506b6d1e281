//! Line grammar of the task document
//!
//! Everything the parser recognises and the serializer emits is defined here:
//! section headings, the task line, note lines, the relationship block
//! markers, date suffixes and the `(glyph, section) -> status` table.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::domain::TaskStatus;

/// Opens the machine-managed relationship block
pub const RELATIONSHIPS_OPEN: &str = "<!-- TASK RELATIONSHIPS";

/// Closes the relationship block
pub const RELATIONSHIPS_CLOSE: &str = "-->";

/// Separator that starts the footer
pub const FOOTER_SEPARATOR: &str = "------------------";

/// Heading emitted for a metadata section the document did not have
pub const METADATA_HEADING: &str = "## Task Metadata";

/// `- [x] **#12.3** description`
pub static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)-\s\[([ xXD])\]\s\*\*#([0-9]+(?:\.[0-9]+)*)\*\*(?:\s(.*))?$")
        .expect("valid task line regex")
});

/// Inline tag markup, consumed together with the whitespace before it
pub static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*`#([^`\s]+)`").expect("valid tag regex"));

pub static ARCHIVED_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\((\d{4}-\d{2}-\d{2})\)$").expect("valid archive date regex"));

pub static DELETED_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\(deleted (\d{4}-\d{2}-\d{2}), expires (\d{4}-\d{2}-\d{2})\)$")
        .expect("valid deletion suffix regex")
});

/// `> note text`
pub static NOTE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)>(.*)$").expect("valid note regex"));

/// Timestamp inside a `Last Updated:` footer line
pub static LAST_UPDATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Last Updated:(?:\*\*)?\s*).*$").expect("valid footer regex"));

/// Sections that hold tasks, in canonical document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Tasks,
    Archived,
    Deleted,
}

impl SectionKind {
    pub const ALL: [SectionKind; 3] = [SectionKind::Tasks, SectionKind::Archived, SectionKind::Deleted];

    /// Heading used when the section has to be created
    pub fn default_heading(&self) -> &'static str {
        match self {
            SectionKind::Tasks => "## Tasks",
            SectionKind::Archived => "## Recently Completed",
            SectionKind::Deleted => "## Deleted Tasks",
        }
    }

    /// Section a task of `status` is written to
    pub fn for_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending | TaskStatus::Completed => SectionKind::Tasks,
            TaskStatus::Archived => SectionKind::Archived,
            TaskStatus::Deleted => SectionKind::Deleted,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Tasks => write!(f, "tasks"),
            SectionKind::Archived => write!(f, "archived"),
            SectionKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// A recognised heading line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Section(SectionKind),
    Metadata,
}

/// Classifies a line as one of the fixed headings
pub fn heading(line: &str) -> Option<Heading> {
    match line.trim() {
        "## Tasks" | "# Tasks" => Some(Heading::Section(SectionKind::Tasks)),
        "## Recently Completed" | "## Archived Tasks" => {
            Some(Heading::Section(SectionKind::Archived))
        }
        "## Deleted Tasks" => Some(Heading::Section(SectionKind::Deleted)),
        "## Task Metadata" => Some(Heading::Metadata),
        _ => None,
    }
}

/// Returns true for lines that end the task sections when nothing else claims them
pub fn starts_footer(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == FOOTER_SEPARATOR || trimmed.starts_with("## ")
}

/// Checkbox glyph of a task line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Open,
    Checked,
    Deleted,
}

impl Glyph {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            ' ' => Some(Glyph::Open),
            'x' | 'X' => Some(Glyph::Checked),
            'D' => Some(Glyph::Deleted),
            _ => None,
        }
    }
}

/// Status of a task line given its glyph and the section it sits in.
///
/// `[ ]` in the archive stays archived: the line lives there, and reading it
/// as pending would move it on the next write.
pub fn resolve_status(glyph: Glyph, section: SectionKind) -> TaskStatus {
    match (glyph, section) {
        (Glyph::Deleted, _) | (_, SectionKind::Deleted) => TaskStatus::Deleted,
        (_, SectionKind::Archived) => TaskStatus::Archived,
        (Glyph::Checked, SectionKind::Tasks) => TaskStatus::Completed,
        (Glyph::Open, SectionKind::Tasks) => TaskStatus::Pending,
    }
}

/// Parses a `YYYY-MM-DD` document date as midnight UTC
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
