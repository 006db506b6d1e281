//! todo-md - A markdown task list that stays human-editable
//!
//! The task list lives in a plain markdown file (`TODO.md`) that people edit
//! by hand and tools mutate through this crate. Reading a document yields the
//! tasks plus a structure snapshot; writing with the same snapshot keeps
//! headers, headings, spacing and free text exactly where they were.

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{Task, TaskId, TaskList, TaskStatus};
pub use storage::{read_document, write_document, DocumentSession, StructureSnapshot};
