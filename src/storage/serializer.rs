//! Document serializer
//!
//! Regenerates the document from tasks, relationships and the snapshot taken
//! when the document was parsed. Section order, heading spelling, blank-line
//! habits and unrecognised lines all come from the snapshot; the serializer
//! only decides which section each task goes to and in what order.

use chrono::{DateTime, Utc};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use thiserror::Error;

use super::grammar::{
    self, SectionKind, FOOTER_SEPARATOR, LAST_UPDATED, RELATIONSHIPS_CLOSE, RELATIONSHIPS_OPEN,
};
use super::snapshot::{Block, InterleaveAnchor, MetadataLayout, SectionLayout, StructureSnapshot};
use crate::domain::{Relationships, Task, TaskStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SerializeError {
    #[error("No structure snapshot: parse the document first or start from a new-document snapshot")]
    MissingSnapshot,
}

/// Serializes a document, stamping the footer with the current time
pub fn serialize(
    tasks: &[Task],
    snapshot: Option<&StructureSnapshot>,
    relationships: &Relationships,
) -> Result<String, SerializeError> {
    serialize_at(tasks, snapshot, relationships, Utc::now())
}

/// Serializes a document with an explicit clock for the footer timestamp
pub fn serialize_at(
    tasks: &[Task],
    snapshot: Option<&StructureSnapshot>,
    relationships: &Relationships,
    now: DateTime<Utc>,
) -> Result<String, SerializeError> {
    let snapshot = snapshot.ok_or(SerializeError::MissingSnapshot)?;

    let mut sections: BTreeMap<SectionKind, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        sections
            .entry(SectionKind::for_status(task.status))
            .or_default()
            .push(task);
    }
    for (kind, tasks) in sections.iter_mut() {
        match kind {
            SectionKind::Tasks => tasks.sort_by(|a, b| a.id.cmp(&b.id)),
            SectionKind::Archived | SectionKind::Deleted => order_by_family(tasks),
        }
    }

    let mut writer = Writer {
        out: snapshot.header_lines.clone(),
        snapshot,
    };

    for planned in plan_blocks(snapshot, &sections, relationships) {
        match planned {
            Planned::Section { layout, new } => {
                let tasks = sections.get(&layout.kind).map(Vec::as_slice).unwrap_or(&[]);
                writer.section(&layout, new, tasks);
            }
            Planned::Metadata { layout, new } => writer.metadata(&layout, new, relationships),
        }
    }
    writer.footer(now);

    let mut text = writer.out.join(snapshot.line_ending);
    if snapshot.trailing_newline {
        text.push_str(snapshot.line_ending);
    }
    Ok(text)
}

enum Planned {
    Section { layout: SectionLayout, new: bool },
    Metadata { layout: MetadataLayout, new: bool },
}

/// The snapshot's blocks, plus any section or metadata block the document
/// now needs but did not have
fn plan_blocks(
    snapshot: &StructureSnapshot,
    sections: &BTreeMap<SectionKind, Vec<&Task>>,
    relationships: &Relationships,
) -> Vec<Planned> {
    let mut plan: Vec<Planned> = snapshot
        .blocks
        .iter()
        .map(|block| match block {
            Block::Section(layout) => Planned::Section {
                layout: layout.clone(),
                new: false,
            },
            Block::Metadata(layout) => Planned::Metadata {
                layout: layout.clone(),
                new: false,
            },
        })
        .collect();

    for kind in SectionKind::ALL {
        let needed = sections.get(&kind).is_some_and(|t| !t.is_empty());
        if !needed || snapshot.section(kind).is_some() {
            continue;
        }
        // After the last section that sorts before this one
        let at = plan
            .iter()
            .rposition(|p| matches!(p, Planned::Section { layout, .. } if layout.kind < kind))
            .map_or(0, |i| i + 1);
        plan.insert(
            at,
            Planned::Section {
                layout: SectionLayout::default_for(kind),
                new: true,
            },
        );
    }

    if !relationships.is_empty() && snapshot.metadata().is_none() {
        plan.push(Planned::Metadata {
            layout: MetadataLayout::generated(),
            new: true,
        });
    }

    plan
}

/// Groups tasks by root family, newest family first, and orders each family
/// parent-first with the newest subtask above its older siblings
fn order_by_family(tasks: &mut Vec<&Task>) {
    let mut families: BTreeMap<u32, Vec<&Task>> = BTreeMap::new();
    for task in tasks.drain(..) {
        families.entry(task.id.root_sequence()).or_default().push(task);
    }

    let mut families: Vec<(Option<DateTime<Utc>>, u32, Vec<&Task>)> = families
        .into_iter()
        .map(|(root, members)| {
            let stamp = members
                .iter()
                .find(|t| t.id.is_root())
                .and_then(|t| t.event_time())
                .or_else(|| members.iter().filter_map(|t| t.event_time()).max());
            (stamp, root, members)
        })
        .collect();
    families.sort_by_key(|(stamp, root, _)| (Reverse(*stamp), Reverse(*root)));

    for (_, _, mut members) in families {
        members.sort_by(|a, b| family_order(a, b));
        tasks.extend(members);
    }
}

fn family_order(a: &Task, b: &Task) -> Ordering {
    for (x, y) in a.id.segments().iter().zip(b.id.segments()) {
        if x != y {
            return y.cmp(x);
        }
    }
    a.id.depth().cmp(&b.id.depth())
}

struct Writer<'a> {
    out: Vec<String>,
    snapshot: &'a StructureSnapshot,
}

impl Writer<'_> {
    /// Adds a blank line unless the output already ends with one
    fn blank(&mut self) {
        if self.out.last().is_some_and(|l| !l.trim().is_empty()) {
            self.out.push(String::new());
        }
    }

    fn interleaved(&mut self, anchor: InterleaveAnchor) {
        let lines = self.snapshot.interleaved_at(&anchor);
        self.out.extend(lines.iter().cloned());
    }

    fn section(&mut self, layout: &SectionLayout, new: bool, tasks: &[&Task]) {
        if new {
            self.blank();
        }
        self.out.push(layout.heading.clone());
        if layout.blank_after_heading {
            self.blank();
        }
        self.interleaved(InterleaveAnchor::SectionStart(layout.kind));

        for (i, task) in tasks.iter().enumerate() {
            if i > 0 && task.id.is_root() && layout.blank_between_tasks {
                self.blank();
            }
            self.task(task);
            self.interleaved(InterleaveAnchor::AfterTask(task.id.clone()));
        }

        if layout.blank_after_section {
            self.blank();
        }
    }

    fn task(&mut self, task: &Task) {
        let indent = "  ".repeat(task.id.depth());
        let mut line = format!("{}- [{}] **#{}**", indent, self.glyph(task), task.id);

        if !task.description.is_empty() {
            line.push(' ');
            line.push_str(&task.description);
        }
        for tag in &task.tags {
            line.push_str(&format!(" `#{}`", tag));
        }

        match (task.status, task.archived_at, task.deleted_at, task.expires_at) {
            (TaskStatus::Archived, Some(at), _, _) => {
                line.push_str(&format!(" ({})", grammar::format_date(&at)));
            }
            (TaskStatus::Deleted, _, Some(deleted), Some(expires)) => {
                line.push_str(&format!(
                    " (deleted {}, expires {})",
                    grammar::format_date(&deleted),
                    grammar::format_date(&expires)
                ));
            }
            _ => {}
        }
        self.out.push(line);

        for note in &task.notes {
            if note.is_empty() {
                self.out.push(format!("{}  >", indent));
            } else {
                self.out.push(format!("{}  > {}", indent, note));
            }
        }
    }

    fn glyph(&self, task: &Task) -> char {
        let glyph = match task.status {
            TaskStatus::Pending => ' ',
            TaskStatus::Completed => 'x',
            TaskStatus::Archived if task.completed_at.is_some() => 'x',
            TaskStatus::Archived => ' ',
            TaskStatus::Deleted => match self.snapshot.deleted_glyphs.get(&task.id) {
                Some(recorded) if recorded.applies_to(task) => recorded.glyph,
                _ if task.deleted_at.is_some() && task.expires_at.is_some() => 'D',
                _ => ' ',
            },
        };
        if glyph == 'x' && self.snapshot.upper_checked.contains(&task.id) {
            'X'
        } else {
            glyph
        }
    }

    fn metadata(&mut self, layout: &MetadataLayout, new: bool, relationships: &Relationships) {
        if new {
            self.blank();
        }
        self.out.extend(layout.preamble.iter().cloned());
        if layout.had_block || !relationships.is_empty() {
            self.out.push(RELATIONSHIPS_OPEN.to_string());
            self.out.extend(relationships.to_lines());
            self.out.extend(layout.unparsed.iter().cloned());
            self.out.push(RELATIONSHIPS_CLOSE.to_string());
        }
        self.out.extend(layout.trailer.iter().cloned());
        if new {
            self.blank();
        }
    }

    fn footer(&mut self, now: DateTime<Utc>) {
        let stamp = grammar::format_timestamp(&now);
        match &self.snapshot.footer {
            Some(lines) => {
                for line in lines {
                    let line = LAST_UPDATED.replace(line, format!("${{1}}{}", stamp).as_str());
                    self.out.push(line.into_owned());
                }
            }
            None => {
                self.blank();
                self.out.push(FOOTER_SEPARATOR.to_string());
                self.out.push(format!(
                    "**todo-md** v{} | Last Updated: {}",
                    env!("CARGO_PKG_VERSION"),
                    stamp
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RelationKind, TaskId};
    use crate::storage::parser::parse_at;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn task(s: &str, status: TaskStatus) -> Task {
        let mut t = Task::new(id(s), format!("Task {}", s), now());
        t.status = status;
        t
    }

    fn ids_in_order(text: &str) -> Vec<String> {
        text.lines()
            .filter_map(|l| grammar::TASK_LINE.captures(l))
            .map(|c| c[3].to_string())
            .collect()
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let result = serialize(&[], None, &Relationships::new());
        assert_eq!(result, Err(SerializeError::MissingSnapshot));
    }

    #[test]
    fn round_trips_an_untouched_document() {
        let text = "\
# My Project

Some intro text.

## Tasks

- [ ] **#1** First `#docs`
  > a note
  - [X] **#1.1** Sub

<!-- keep me -->

- [ ] **#2** Second
> quoted at column 0

## Recently Completed
- [x] **#4** Newer (2025-05-02)
  - [x] **#4.2** Second child (2025-05-02)
  - [x] **#4.1** First child (2025-05-02)
- [ ] **#3** Dropped (2025-05-01)

## Deleted Tasks
- [D] **#6** Gone (deleted 2025-05-20, expires 2025-06-19)
- [ ] **#5** Legacy deleted

## Task Metadata

Free text kept as is.

<!-- TASK RELATIONSHIPS
2:depends-on:1
-->

------------------
**Last Updated:** 2025-01-01 00:00:00
";
        let doc = parse_at(text, now());
        let out = serialize_at(&doc.tasks, Some(&doc.snapshot), &doc.relationships, now()).unwrap();
        let expected = text.replace("2025-01-01 00:00:00", "2025-06-01 12:00:00");
        assert_eq!(out, expected);
    }

    fn untouched(text: &str) -> String {
        let doc = parse_at(text, now());
        serialize_at(&doc.tasks, Some(&doc.snapshot), &doc.relationships, now()).unwrap()
    }

    #[test]
    fn crlf_document_keeps_its_line_endings() {
        let text = "# Head\r\n\r\n## Tasks\r\n\r\n- [ ] **#1** One\r\n\r\n------------------\r\nfoot\r\n";
        assert_eq!(untouched(text), text);
    }

    #[test]
    fn misplaced_note_lines_stay_where_they_were() {
        let text = "\
## Tasks
- [ ] **#1** One
> A blockquote the user wrote at column 0
  - [ ] **#1.1** Sub
  > note
- [ ] **#2** Two

------------------
foot
";
        assert_eq!(untouched(text), text);
    }

    #[test]
    fn unclosed_relationship_block_keeps_the_footer() {
        let text = "\
## Tasks
- [ ] **#1** One

## Task Metadata
<!-- TASK RELATIONSHIPS
1:related-to:1
not a relationship

------------------
**Last Updated:** x
";
        let expected = "\
## Tasks
- [ ] **#1** One

## Task Metadata
<!-- TASK RELATIONSHIPS
1:related-to:1
not a relationship
-->

------------------
**Last Updated:** 2025-06-01 12:00:00
";
        assert_eq!(untouched(text), expected);
    }

    #[test]
    fn deleting_a_restored_task_again_uses_the_deleted_glyph() {
        let text = "## Tasks\n\n## Deleted Tasks\n- [ ] **#5** Legacy\n";
        let doc = parse_at(text, now());
        let mut tasks = crate::domain::TaskList::from_tasks(doc.tasks);
        tasks.restore(&id("5"), true, now()).unwrap();
        tasks.delete(&id("5"), Duration::days(30), true, now()).unwrap();

        let out = serialize_at(tasks.tasks(), Some(&doc.snapshot), &doc.relationships, now()).unwrap();
        assert!(out.contains("- [D] **#5** Legacy (deleted 2025-06-01, expires 2025-07-01)\n"));
    }

    #[test]
    fn tasks_section_orders_numerically() {
        let ids = ["100", "10.10", "2", "10.2", "10", "9", "10.1"];
        let mut tasks: Vec<Task> = Vec::new();
        for s in ids {
            tasks.push(task(s, TaskStatus::Pending));
        }
        let out = serialize_at(
            &tasks,
            Some(&StructureSnapshot::new_document()),
            &Relationships::new(),
            now(),
        )
        .unwrap();
        assert_eq!(
            ids_in_order(&out),
            vec!["2", "9", "10", "10.1", "10.2", "10.10", "100"]
        );
    }

    #[test]
    fn archive_orders_newest_family_first() {
        let mut tasks = vec![
            task("1", TaskStatus::Archived),
            task("1.1", TaskStatus::Archived),
            task("1.2", TaskStatus::Archived),
            task("2", TaskStatus::Archived),
            task("2.1", TaskStatus::Archived),
        ];
        for t in tasks.iter_mut() {
            t.archived_at = Some(if t.id.root_sequence() == 2 {
                now()
            } else {
                now() - Duration::days(3)
            });
        }
        let out = serialize_at(
            &tasks,
            Some(&StructureSnapshot::new_document()),
            &Relationships::new(),
            now(),
        )
        .unwrap();
        assert_eq!(ids_in_order(&out), vec!["2", "2.1", "1", "1.2", "1.1"]);
    }

    #[test]
    fn new_sections_and_metadata_are_created() {
        let mut archived = task("2", TaskStatus::Archived);
        archived.completed_at = Some(now());
        archived.archived_at = Some(now());
        let tasks = vec![task("1", TaskStatus::Pending), archived];

        let mut rels = Relationships::new();
        rels.set(id("1"), RelationKind::RelatedTo, vec![id("2")]);

        let out = serialize_at(
            &tasks,
            Some(&StructureSnapshot::new_document()),
            &rels,
            now(),
        )
        .unwrap();
        let expected = "\
# Task List

> Maintained by `todo-md`. Hand edits are preserved.

## Tasks

- [ ] **#1** Task 1

## Recently Completed
- [x] **#2** Task 2 (2025-06-01)

## Task Metadata

Task relationships and dependencies (managed by todo-md).
View with: `todo-md show <task-id>`

<!-- TASK RELATIONSHIPS
1:related-to:2
-->

------------------
";
        assert!(out.starts_with(expected), "unexpected output:\n{}", out);
        assert!(out.ends_with("Last Updated: 2025-06-01 12:00:00\n"));
    }

    #[test]
    fn empty_section_keeps_single_blank() {
        let text = "## Tasks\n\n## Deleted Tasks\n\n------------------\n";
        let doc = parse_at(text, now());
        let out = serialize_at(&doc.tasks, Some(&doc.snapshot), &doc.relationships, now()).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn newly_deleted_task_gets_deleted_glyph() {
        let mut t = task("3", TaskStatus::Deleted);
        t.deleted_at = Some(now());
        t.expires_at = Some(now() + Duration::days(30));
        let out = serialize_at(
            &[t],
            Some(&StructureSnapshot::new_document()),
            &Relationships::new(),
            now(),
        )
        .unwrap();
        assert!(out.contains("- [D] **#3** Task 3 (deleted 2025-06-01, expires 2025-07-01)"));
    }
}
