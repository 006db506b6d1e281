//! Domain model for todo-md
//!
//! Tasks, their lifecycle and relationships, with no I/O.

mod graph;
mod id;
mod lifecycle;
mod relationship;
mod task;
mod task_list;

pub use graph::{DependencyGraph, GraphError};
pub use id::{IdAllocator, IdError, SequentialAllocator, TaskId};
pub use lifecycle::{apply, archive_allowed, check_archive_policy, LifecycleError, Operation};
pub use relationship::{parse_line as parse_relationship_line, RelationKind, RelationshipError, Relationships};
pub use task::{normalize_tag, Task, TaskStatus, IN_PROGRESS_TAG};
pub use task_list::{EngineError, TaskFilter, TaskList};
