//! # Command-Line Interface
//!
//! User-facing commands and output formatting. Every mutating command is a
//! single read, mutate, write cycle on the task document.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init` |
//! | Tasks | Creating and reading tasks | `add`, `subtask`, `list`, `show`, `modify` |
//! | Lifecycle | Status transitions | `complete`, `undo`, `archive`, `delete`, `restore` |
//! | Progress | In-progress marker | `start`, `stop` |
//! | Notes | Indented notes under a task | `note`, `note-update`, `note-clear` |
//! | Links | Typed relationships | `relate` |
//! | Cleanup | Expired deleted tasks | `empty-trash` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! The default can be changed with `default_format` in the global config.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging on stderr:
//! ```bash
//! todo-md --verbose complete 3
//! ```
//!
//! `RUST_LOG` overrides both.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
