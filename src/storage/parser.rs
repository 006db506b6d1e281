//! Document parser
//!
//! Reads the task document line by line with a small section state machine:
//!
//! ```text
//! Header --heading--> Tasks | Archived | Deleted --heading--> ...
//!    |                        |
//!    +---- metadata / relationship block ----> Metadata
//!                             |
//!          separator or unknown "## " heading ----> Footer (terminal)
//! ```
//!
//! Parsing never fails. Lines that are not tasks, notes or blanks are kept
//! verbatim in the snapshot; lines that look like broken task or relationship
//! lines are additionally reported as [`Diagnostic`]s. A relationship block
//! missing its `-->` ends at the next heading or footer separator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use super::grammar::{
    self, Glyph, Heading, SectionKind, ARCHIVED_SUFFIX, DELETED_SUFFIX, NOTE_LINE,
    RELATIONSHIPS_CLOSE, RELATIONSHIPS_OPEN, TAG, TASK_LINE,
};
use super::snapshot::{
    Block, DeletedGlyph, InterleaveAnchor, MetadataLayout, SectionLayout, StructureSnapshot,
};
use crate::domain::{parse_relationship_line, Relationships, Task, TaskId, TaskStatus};

/// Parser settings
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Report diagnostics at `warn` instead of `debug`
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Looks like a task line but does not match the grammar
    MalformedTaskLine,
    /// A second task line with an ID already in use
    DuplicateTask { id: String },
    /// A section heading that already appeared earlier
    DuplicateSection,
    /// A relationship block line that does not parse
    MalformedRelationship { reason: String },
    /// A relationship block cut off by a heading, separator or end of file
    UnclosedRelationships,
}

/// A line the parser kept as opaque text although it looked structured
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based line number
    pub line: usize,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub text: String,
}

/// Result of parsing one document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Tasks in document order
    pub tasks: Vec<Task>,
    pub snapshot: StructureSnapshot,
    pub relationships: Relationships,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses a document, stamping parse-time fields with the current time
pub fn parse(text: &str) -> ParsedDocument {
    parse_at(text, Utc::now())
}

/// Parses a document with an explicit clock
pub fn parse_at(text: &str, now: DateTime<Utc>) -> ParsedDocument {
    parse_with(text, ParseOptions::default(), now)
}

/// Parses a document with explicit options and clock
pub fn parse_with(text: &str, options: ParseOptions, now: DateTime<Utc>) -> ParsedDocument {
    let mut parser = Parser::new(now);
    let mut last_line = 0;
    for (idx, line) in text.lines().enumerate() {
        parser.line(idx + 1, line);
        last_line = idx + 1;
    }
    let mut doc = parser.finish(last_line);
    doc.snapshot.trailing_newline = text.is_empty() || text.ends_with('\n');
    doc.snapshot.line_ending = line_ending(text);

    for diag in &doc.diagnostics {
        if options.strict {
            tracing::warn!(line = diag.line, kind = ?diag.kind, text = %diag.text, "line not tracked");
        } else {
            tracing::debug!(line = diag.line, kind = ?diag.kind, text = %diag.text, "line not tracked");
        }
    }
    tracing::debug!(
        tasks = doc.tasks.len(),
        relationships = doc.relationships.iter().count(),
        "parsed document"
    );
    doc
}

/// Line ending of the first line break, `"\n"` when there is none
fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(end) if text[..end].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Section(SectionKind),
    Metadata,
    Footer,
}

/// Bookkeeping for the task section being read
struct OpenSection {
    /// Index into `blocks`
    block: usize,
    /// Next line is the first after the heading
    fresh: bool,
    pending_blanks: usize,
    last_task: Option<TaskId>,
    /// Note lines may still attach to `last_task`
    notes_open: bool,
    last_root_seen: bool,
    gap_observed: bool,
}

struct Parser {
    now: DateTime<Utc>,
    state: State,
    header_lines: Vec<String>,
    blocks: Vec<Block>,
    footer: Vec<String>,
    snapshot: StructureSnapshot,
    tasks: Vec<Task>,
    seen: HashSet<TaskId>,
    relationships: Relationships,
    diagnostics: Vec<Diagnostic>,
    section: Option<OpenSection>,
    /// Metadata layout and the block position it is inserted at
    metadata: Option<(usize, MetadataLayout)>,
    in_relationships: bool,
    /// Blank lines since the last non-blank line of the relationship block
    block_blanks: usize,
}

impl Parser {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            state: State::Header,
            header_lines: Vec::new(),
            blocks: Vec::new(),
            footer: Vec::new(),
            snapshot: StructureSnapshot::empty(),
            tasks: Vec::new(),
            seen: HashSet::new(),
            relationships: Relationships::new(),
            diagnostics: Vec::new(),
            section: None,
            metadata: None,
            in_relationships: false,
            block_blanks: 0,
        }
    }

    fn diagnose(&mut self, line_no: usize, kind: DiagnosticKind, text: &str) {
        self.diagnostics.push(Diagnostic {
            line: line_no,
            kind,
            text: text.to_string(),
        });
    }

    fn line(&mut self, line_no: usize, line: &str) {
        match self.state {
            State::Footer => self.footer.push(line.to_string()),
            State::Metadata if self.in_relationships => {
                if grammar::heading(line).is_some() || grammar::starts_footer(line) {
                    self.end_unclosed_block(line_no);
                    self.structural_line(line_no, line);
                } else {
                    self.relationship_line(line_no, line);
                }
            }
            _ => self.structural_line(line_no, line),
        }
    }

    /// Handles headings and markers, then hands the line to the current state
    fn structural_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();

        if let Some(heading) = grammar::heading(line) {
            match heading {
                Heading::Section(kind) => {
                    self.open_section(line_no, kind, line);
                    return;
                }
                Heading::Metadata => {
                    if self.state != State::Metadata {
                        self.open_metadata();
                    }
                    self.push_metadata_line(line);
                    return;
                }
            }
        }

        if trimmed == RELATIONSHIPS_OPEN {
            if self.state != State::Metadata {
                self.open_metadata();
            }
            self.metadata_mut().had_block = true;
            self.in_relationships = true;
            return;
        }

        if self.state != State::Header && grammar::starts_footer(line) {
            self.close_section();
            self.state = State::Footer;
            self.footer.push(line.to_string());
            return;
        }

        match self.state {
            State::Header => self.header_lines.push(line.to_string()),
            State::Metadata => self.push_metadata_line(line),
            State::Section(kind) => self.section_line(line_no, kind, line),
            State::Footer => self.footer.push(line.to_string()),
        }
    }

    fn open_section(&mut self, line_no: usize, kind: SectionKind, heading: &str) {
        self.close_section();

        let existing = self.blocks.iter().position(|b| match b {
            Block::Section(layout) => layout.kind == kind,
            _ => false,
        });

        let block = match existing {
            Some(idx) => {
                self.diagnose(line_no, DiagnosticKind::DuplicateSection, heading);
                idx
            }
            None => {
                let mut layout = SectionLayout::default_for(kind);
                layout.heading = heading.to_string();
                layout.blank_after_heading = false;
                layout.blank_after_section = false;
                self.blocks.push(Block::Section(layout));
                self.blocks.len() - 1
            }
        };

        self.section = Some(OpenSection {
            block,
            fresh: existing.is_none(),
            pending_blanks: 0,
            last_task: None,
            notes_open: false,
            last_root_seen: false,
            gap_observed: false,
        });
        self.state = State::Section(kind);
    }

    fn close_section(&mut self) {
        let Some(open) = self.section.take() else {
            return;
        };
        if let Some(Block::Section(layout)) = self.blocks.get_mut(open.block) {
            layout.blank_after_section = open.pending_blanks > 0;
        }
    }

    fn open_metadata(&mut self) {
        self.close_section();
        self.state = State::Metadata;
    }

    fn metadata_mut(&mut self) -> &mut MetadataLayout {
        let position = self.blocks.len();
        &mut self
            .metadata
            .get_or_insert_with(|| (position, MetadataLayout::default()))
            .1
    }

    fn push_metadata_line(&mut self, line: &str) {
        let meta = self.metadata_mut();
        if meta.had_block {
            meta.trailer.push(line.to_string());
        } else {
            meta.preamble.push(line.to_string());
        }
    }

    /// Closes a relationship block that never saw `-->`
    fn end_unclosed_block(&mut self, line_no: usize) {
        self.in_relationships = false;
        self.diagnose(line_no, DiagnosticKind::UnclosedRelationships, RELATIONSHIPS_OPEN);
        for _ in 0..std::mem::take(&mut self.block_blanks) {
            self.push_metadata_line("");
        }
    }

    fn relationship_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim();
        if trimmed == RELATIONSHIPS_CLOSE {
            self.in_relationships = false;
            self.block_blanks = 0;
            return;
        }
        if trimmed.is_empty() {
            self.block_blanks += 1;
            return;
        }
        self.block_blanks = 0;
        match parse_relationship_line(trimmed) {
            Ok((task, kind, targets)) => {
                let mut merged = self.relationships.targets(&task, kind).to_vec();
                merged.extend(targets);
                self.relationships.set(task, kind, merged);
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "skipping relationship line");
                self.diagnose(
                    line_no,
                    DiagnosticKind::MalformedRelationship {
                        reason: e.to_string(),
                    },
                    line,
                );
                self.metadata_mut().unparsed.push(line.to_string());
            }
        }
    }

    fn section_line(&mut self, line_no: usize, kind: SectionKind, line: &str) {
        let Some(open) = self.section.as_mut() else {
            return;
        };
        let fresh = std::mem::replace(&mut open.fresh, false);

        if line.trim().is_empty() {
            if fresh {
                if let Some(Block::Section(layout)) = self.blocks.get_mut(open.block) {
                    layout.blank_after_heading = true;
                }
            } else {
                open.pending_blanks += 1;
            }
            return;
        }

        if let Some(task) = self.task_from_line(line_no, kind, line) {
            self.record_task(task);
            return;
        }

        if let Some(text) = self.note_text(line) {
            if let Some(task) = self.tasks.last_mut() {
                task.notes.push(text);
            }
            return;
        }

        if line.trim_start().starts_with("- [") {
            self.diagnose(line_no, DiagnosticKind::MalformedTaskLine, line);
        }
        self.record_interleaved(kind, line);
    }

    /// Returns the note text if `line` continues the notes of the last task.
    /// Notes sit one level deeper than their task.
    fn note_text(&self, line: &str) -> Option<String> {
        let open = self.section.as_ref()?;
        if !open.notes_open || open.pending_blanks > 0 {
            return None;
        }
        let depth = open.last_task.as_ref()?.depth();
        let caps = NOTE_LINE.captures(line)?;
        if caps[1] != "  ".repeat(depth + 1) {
            return None;
        }
        let text = caps.get(2).map_or("", |m| m.as_str());
        Some(text.strip_prefix(' ').unwrap_or(text).to_string())
    }

    fn record_interleaved(&mut self, kind: SectionKind, line: &str) {
        let Some(open) = self.section.as_mut() else {
            return;
        };
        let anchor = match &open.last_task {
            Some(id) => InterleaveAnchor::AfterTask(id.clone()),
            None => InterleaveAnchor::SectionStart(kind),
        };
        let blanks = std::mem::take(&mut open.pending_blanks);
        open.notes_open = false;
        let lines = self.snapshot.interleaved.entry(anchor).or_default();
        lines.extend(std::iter::repeat(String::new()).take(blanks));
        lines.push(line.to_string());
    }

    fn record_task(&mut self, task: Task) {
        let Some(open) = self.section.as_mut() else {
            return;
        };

        if task.id.is_root() {
            if open.last_root_seen && !open.gap_observed {
                if let Some(Block::Section(layout)) = self.blocks.get_mut(open.block) {
                    layout.blank_between_tasks = open.pending_blanks > 0;
                }
                open.gap_observed = true;
            }
            open.last_root_seen = true;
        }

        open.pending_blanks = 0;
        open.notes_open = true;
        open.last_task = Some(task.id.clone());
        self.seen.insert(task.id.clone());
        self.tasks.push(task);
    }

    fn task_from_line(&mut self, line_no: usize, kind: SectionKind, line: &str) -> Option<Task> {
        let caps = TASK_LINE.captures(line)?;
        let mark = caps[2].chars().next()?;
        let glyph = Glyph::from_char(mark)?;

        let id: TaskId = match caps[3].parse() {
            Ok(id) => id,
            Err(_) => {
                self.diagnose(line_no, DiagnosticKind::MalformedTaskLine, line);
                return None;
            }
        };
        if self.seen.contains(&id) {
            self.diagnose(
                line_no,
                DiagnosticKind::DuplicateTask { id: id.to_string() },
                line,
            );
            return None;
        }

        let raw = caps.get(4).map_or("", |m| m.as_str());
        let tags: Vec<String> = TAG
            .captures_iter(raw)
            .map(|c| c[1].to_string())
            .collect();
        let mut description = TAG.replace_all(raw, "").trim().to_string();

        let status = grammar::resolve_status(glyph, kind);
        let mut task = Task::new(id, String::new(), self.now).with_tags(tags);
        task.status = status;

        match status {
            TaskStatus::Archived => {
                if let Some((at, rest)) = strip_archived_suffix(&description) {
                    task.archived_at = Some(at);
                    description = rest;
                }
            }
            TaskStatus::Deleted => {
                if let Some((deleted, expires, rest)) = strip_deleted_suffix(&description) {
                    task.deleted_at = Some(deleted);
                    task.expires_at = Some(expires);
                    description = rest;
                }
                if kind == SectionKind::Deleted {
                    self.snapshot.deleted_glyphs.insert(
                        task.id.clone(),
                        DeletedGlyph {
                            glyph: mark,
                            deleted_at: task.deleted_at,
                            expires_at: task.expires_at,
                        },
                    );
                }
            }
            TaskStatus::Pending | TaskStatus::Completed => {}
        }

        if glyph == Glyph::Checked {
            task.completed_at = Some(task.archived_at.unwrap_or(self.now));
        }
        if mark == 'X' {
            self.snapshot.upper_checked.insert(task.id.clone());
        }
        task.description = description;
        Some(task)
    }

    fn finish(mut self, last_line: usize) -> ParsedDocument {
        if self.in_relationships {
            self.end_unclosed_block(last_line);
        }
        self.close_section();

        let mut blocks = self.blocks;
        if let Some((position, meta)) = self.metadata {
            blocks.insert(position.min(blocks.len()), Block::Metadata(meta));
        }

        let mut snapshot = self.snapshot;
        snapshot.header_lines = self.header_lines;
        snapshot.blocks = blocks;
        snapshot.footer = (self.state == State::Footer).then_some(self.footer);

        ParsedDocument {
            tasks: self.tasks,
            snapshot,
            relationships: self.relationships,
            diagnostics: self.diagnostics,
        }
    }
}

fn strip_archived_suffix(description: &str) -> Option<(DateTime<Utc>, String)> {
    let caps = ARCHIVED_SUFFIX.captures(description)?;
    let at = grammar::parse_date(&caps[1])?;
    let start = caps.get(0)?.start();
    Some((at, description[..start].to_string()))
}

fn strip_deleted_suffix(description: &str) -> Option<(DateTime<Utc>, DateTime<Utc>, String)> {
    let caps = DELETED_SUFFIX.captures(description)?;
    let deleted = grammar::parse_date(&caps[1])?;
    let expires = grammar::parse_date(&caps[2])?;
    let start = caps.get(0)?.start();
    Some((deleted, expires, description[..start].to_string()))
}
