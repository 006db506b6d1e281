//! Tamper detection for the task document
//!
//! The session asks an [`IntegrityGuard`] to verify raw document text before
//! parsing and to record the text it just wrote. [`NoIntegrity`] accepts
//! everything; [`ChecksumGuard`] keeps a blake3 digest of the last write and
//! rejects documents changed behind its back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Document was modified outside todo-md (expected {expected}, found {actual}). Remove the checksum file to accept the changes.")]
    TamperDetected { expected: String, actual: String },

    #[error("Failed to access checksum file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Verifies document text before it is parsed
pub trait IntegrityGuard {
    fn verify(&self, raw: &str) -> Result<(), IntegrityError>;

    /// Remembers `raw` as the last trusted content
    fn record(&self, raw: &str) -> Result<(), IntegrityError>;
}

/// Accepts any content
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntegrity;

impl IntegrityGuard for NoIntegrity {
    fn verify(&self, _raw: &str) -> Result<(), IntegrityError> {
        Ok(())
    }

    fn record(&self, _raw: &str) -> Result<(), IntegrityError> {
        Ok(())
    }
}

/// Compares documents against a stored blake3 digest
#[derive(Debug, Clone)]
pub struct ChecksumGuard {
    path: PathBuf,
}

impl ChecksumGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stored(&self) -> Result<Option<String>, IntegrityError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(IntegrityError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

pub fn digest(raw: &str) -> String {
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

impl IntegrityGuard for ChecksumGuard {
    fn verify(&self, raw: &str) -> Result<(), IntegrityError> {
        // Nothing recorded yet means nothing to compare against
        let Some(expected) = self.stored()? else {
            return Ok(());
        };
        let actual = digest(raw);
        if expected != actual {
            return Err(IntegrityError::TamperDetected { expected, actual });
        }
        Ok(())
    }

    fn record(&self, raw: &str) -> Result<(), IntegrityError> {
        let io_err = |source| IntegrityError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, format!("{}\n", digest(raw))).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn checksum_guard_detects_changes() {
        let dir = TempDir::new().unwrap();
        let guard = ChecksumGuard::new(dir.path().join("state").join("checksum"));

        // First use has nothing to compare with
        assert!(guard.verify("anything").is_ok());

        guard.record("## Tasks\n").unwrap();
        assert!(guard.verify("## Tasks\n").is_ok());

        let err = guard.verify("## Tasks\n- [ ] **#1** sneaky\n").unwrap_err();
        match err {
            IntegrityError::TamperDetected { expected, actual } => {
                assert_eq!(expected, digest("## Tasks\n"));
                assert_ne!(expected, actual);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn no_integrity_accepts_everything() {
        NoIntegrity.record("a").unwrap();
        assert!(NoIntegrity.verify("b").is_ok());
    }
}
