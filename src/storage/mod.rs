//! # Storage Layer
//!
//! The task document on disk and everything needed to read it back exactly.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | Markdown task list | `TODO.md` |
//! | Config | YAML | `.todo-md/config.yaml` |
//! | Root ID serial | Plain integer | `.todo-md/serial` |
//! | Integrity digest | blake3 hex | `.todo-md/checksum` |
//!
//! ## Round-tripping
//!
//! - [`parser`] turns text into tasks, relationships and a [`StructureSnapshot`]
//! - [`serializer`] turns them back into text using the same snapshot
//! - [`DocumentSession`] keeps the snapshot between writes
//! - All writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for a document and its state directory
//! - [`DocumentSession`] - Read/write handle for one document
//! - [`Config`] - Project and global configuration

pub mod grammar;
pub mod parser;
pub mod serializer;
mod config;
mod integrity;
mod project;
mod session;
mod snapshot;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, STATE_DIR};
pub use integrity::{ChecksumGuard, IntegrityError, IntegrityGuard, NoIntegrity};
pub use parser::{parse, parse_at, parse_with, Diagnostic, DiagnosticKind, ParseOptions, ParsedDocument};
pub use project::{Project, ProjectError, DOCUMENT_NAME};
pub use serializer::{serialize, serialize_at, SerializeError};
pub use session::{atomic_write, read_document, write_document, DocumentSession, Fingerprint};
pub use snapshot::{
    Block, DeletedGlyph, InterleaveAnchor, MetadataLayout, SectionLayout, StructureSnapshot,
};
