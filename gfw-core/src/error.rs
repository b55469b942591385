use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("File {} did not stabilize within {max_wait:?}", path.display())]
    StabilizationTimeout { path: PathBuf, max_wait: Duration },

    #[error("Integrity inconsistency: {0}")]
    IntegrityInconsistency(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Classify an I/O failure on `path` into the not-found / permission
    /// buckets, keeping anything else as a plain I/O error.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => {
                IngestError::NotFound(format!("{}: {}", path.display(), err))
            }
            io::ErrorKind::PermissionDenied => {
                IngestError::PermissionDenied(format!(
                    "{}: {}",
                    path.display(),
                    err
                ))
            }
            _ => IngestError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            IngestError::NotFound(_) => true,
            IngestError::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            IngestError::PermissionDenied(_) => true,
            IngestError::Io(err) => {
                err.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let path = Path::new("/tmp/missing.txt");

        let missing = IngestError::from_io(
            io::Error::new(io::ErrorKind::NotFound, "gone"),
            path,
        );
        assert!(missing.is_not_found());
        assert!(missing.to_string().contains("/tmp/missing.txt"));

        let denied = IngestError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
            path,
        );
        assert!(denied.is_permission_denied());

        let other = IngestError::from_io(
            io::Error::new(io::ErrorKind::Other, "disk on fire"),
            path,
        );
        assert!(matches!(other, IngestError::Io(_)));
    }
}
