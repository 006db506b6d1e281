//! Document round-trip tests
//!
//! Exercise the library directly: parse, mutate through the task list and
//! serialize again, checking that only the intended lines change.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

use todo_md::domain::{RelationKind, Relationships, Task, TaskId, TaskList, TaskStatus};
use todo_md::storage::{self, grammar, parse_at, serialize_at, StructureSnapshot};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn id(s: &str) -> TaskId {
    s.parse().unwrap()
}

fn task_ids(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|l| grammar::TASK_LINE.captures(l))
        .map(|c| c[3].to_string())
        .collect()
}

// =============================================================================
// Lifecycle Scenarios
// =============================================================================

#[test]
fn archiving_a_family_puts_it_above_older_archives() {
    let text = "\
## Tasks

- [ ] **#1** One

- [ ] **#2** Two
  - [ ] **#2.1** Two child

## Recently Completed
- [x] **#9** Old work (2024-01-01)
";
    let doc = parse_at(text, now());
    let mut tasks = TaskList::from_tasks(doc.tasks);

    tasks.complete(&id("2"), now()).unwrap();
    let changed = tasks.archive(&id("2"), None, true, now()).unwrap();
    assert_eq!(changed, vec![id("2"), id("2.1")]);

    assert_eq!(tasks.get(&id("1")).unwrap().status, TaskStatus::Pending);
    assert_eq!(tasks.get(&id("2")).unwrap().status, TaskStatus::Archived);
    assert_eq!(tasks.get(&id("2.1")).unwrap().status, TaskStatus::Archived);

    let out = serialize_at(tasks.tasks(), Some(&doc.snapshot), &doc.relationships, now()).unwrap();
    assert!(out.starts_with("## Tasks\n\n- [ ] **#1** One\n\n## Recently Completed\n"));
    assert!(out.contains(
        "## Recently Completed\n\
         - [x] **#2** Two (2025-06-01)\n  \
         - [ ] **#2.1** Two child (2025-06-01)\n\
         - [x] **#9** Old work (2024-01-01)\n"
    ));
}

#[test]
fn pending_archive_needs_a_reason() {
    let doc = parse_at("## Tasks\n- [ ] **#1** Idea\n", now());
    let mut tasks = TaskList::from_tasks(doc.tasks);

    assert!(tasks.archive(&id("1"), None, true, now()).is_err());
    assert_eq!(tasks.get(&id("1")).unwrap().status, TaskStatus::Pending);

    tasks.archive(&id("1"), Some("out of scope"), true, now()).unwrap();
    assert_eq!(tasks.get(&id("1")).unwrap().status, TaskStatus::Archived);
}

#[test]
fn restore_round_trips_through_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("TODO.md");
    fs::write(&path, "## Tasks\n\n- [x] **#1** Done thing\n- [ ] **#2** Open thing\n").unwrap();

    let (mut tasks, mut session) = storage::read_document(&path).unwrap();
    tasks
        .delete(&id("1"), chrono::Duration::days(30), true, now())
        .unwrap();
    session.write_document(&tasks).unwrap();

    let (mut tasks, mut session) = storage::read_document(&path).unwrap();
    assert_eq!(tasks.get(&id("1")).unwrap().status, TaskStatus::Deleted);
    tasks.restore(&id("1"), true, now()).unwrap();
    // Restoring again converges instead of failing
    assert!(tasks.restore(&id("1"), true, now()).unwrap().is_empty());
    session.write_document(&tasks).unwrap();

    // The `D` glyph does not record completion, so it comes back pending
    let (tasks, _) = storage::read_document(&path).unwrap();
    let restored = tasks.get(&id("1")).unwrap();
    assert_eq!(restored.status, TaskStatus::Pending);
    assert!(fs::read_to_string(&path)
        .unwrap()
        .contains("- [ ] **#1** Done thing\n"));
}

#[test]
fn restore_in_session_remembers_completion() {
    let doc = parse_at("## Tasks\n- [x] **#1** Done thing\n", now());
    let mut tasks = TaskList::from_tasks(doc.tasks);

    tasks
        .delete(&id("1"), chrono::Duration::days(30), true, now())
        .unwrap();
    tasks.restore(&id("1"), true, now()).unwrap();
    assert_eq!(tasks.get(&id("1")).unwrap().status, TaskStatus::Completed);
}

// =============================================================================
// Session Tests
// =============================================================================

#[test]
fn untouched_write_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("TODO.md");
    let text = "\
Project notes that are not a heading.

## Tasks
- [ ] **#3** Third
  > with a note
- [ ] **#10** Tenth `#later`
Loose line.

## Task Metadata
<!-- TASK RELATIONSHIPS
10:blocks:3
-->

------------------
Hand written footer
";
    fs::write(&path, text).unwrap();

    let (tasks, mut session) = storage::read_document(&path).unwrap();
    session.write_document(&tasks).unwrap();
    session.write_document(&tasks).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn session_keeps_relationships_between_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("TODO.md");
    fs::write(&path, "## Tasks\n- [ ] **#1** A\n- [ ] **#2** B\n").unwrap();

    let (tasks, mut session) = storage::read_document(&path).unwrap();
    session
        .relate(&tasks, &id("2"), RelationKind::DependsOn, vec![id("1")])
        .unwrap();
    session.write_document(&tasks).unwrap();
    session.write_document(&tasks).unwrap();

    let (tasks, session) = storage::read_document(&path).unwrap();
    assert_eq!(
        session.relationships().targets(&id("2"), RelationKind::DependsOn),
        &[id("1")]
    );
    assert_eq!(session.open_dependencies(&tasks, &id("2")).unwrap(), vec![id("1")]);
}

#[test]
fn refresh_picks_up_external_edits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("TODO.md");
    fs::write(&path, "## Tasks\n- [ ] **#1** A\n").unwrap();

    let (_, mut session) = storage::read_document(&path).unwrap();
    assert!(session.refresh_if_changed().unwrap().is_none());

    fs::write(&path, "## Tasks\n- [ ] **#1** A\n- [ ] **#2** Added by hand\n").unwrap();
    let fresh = session.refresh_if_changed().unwrap().unwrap();
    assert_eq!(fresh.len(), 2);
}

#[test]
fn one_shot_write_needs_a_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("TODO.md");
    let tasks = vec![Task::new(id("1"), "Fresh", now())];

    assert!(storage::write_document(&path, &tasks, None, &Relationships::new()).is_err());
    assert!(!path.exists());

    storage::write_document(
        &path,
        &tasks,
        Some(&StructureSnapshot::new_document()),
        &Relationships::new(),
    )
    .unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("## Tasks\n\n- [ ] **#1** Fresh\n"));
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn tasks_section_is_numerically_ordered(
        roots in prop::collection::btree_set(1u32..500, 1..20),
        children in 0u32..12,
    ) {
        let mut tasks = Vec::new();
        for root in roots.iter().rev() {
            let root_id = TaskId::root(*root);
            for n in (1..=children).rev() {
                tasks.push(Task::new(root_id.child(n), "child", now()));
            }
            tasks.push(Task::new(root_id, "root", now()));
        }

        let out = serialize_at(
            &tasks,
            Some(&StructureSnapshot::new_document()),
            &Relationships::new(),
            now(),
        )
        .unwrap();

        let mut expected: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        expected.sort();
        let expected: Vec<String> = expected.iter().map(|i| i.to_string()).collect();
        prop_assert_eq!(task_ids(&out), expected);

        // And the output reads back to the same tasks
        let doc = parse_at(&out, now());
        prop_assert_eq!(doc.tasks.len(), tasks.len());
        prop_assert!(doc.diagnostics.is_empty());
    }
}
