//! Domain types shared by the watcher, reconciler and record store.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surrogate identity assigned by the record store on insert.
pub type RecordId = i64;

/// One configured tenant: a named pair of watch and destination directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub name: String,
    pub watch_dir: PathBuf,
    pub dest_dir: PathBuf,
}

impl TenantConfig {
    pub fn new(
        name: impl Into<String>,
        watch_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            watch_dir: watch_dir.into(),
            dest_dir: dest_dir.into(),
        }
    }

    /// Path a file named `file_name` takes inside the watch directory. This is
    /// the record key used by both the watcher and the reconciler.
    pub fn source_path(&self, file_name: &OsStr) -> PathBuf {
        self.watch_dir.join(file_name)
    }

    /// Destination for a file named `file_name`.
    pub fn dest_path(&self, file_name: &OsStr) -> PathBuf {
        self.dest_dir.join(file_name)
    }
}

impl fmt::Display for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {})",
            self.name,
            self.watch_dir.display(),
            self.dest_dir.display()
        )
    }
}

/// Persisted proof that a tenant has processed a source path.
///
/// `file_size` and `dest_dir` are optional because rows written before those
/// columns existed are migrated in place with NULLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRecord {
    pub id: RecordId,
    pub tenant: String,
    pub source_path: String,
    pub processed_at: DateTime<Utc>,
    pub file_size: Option<i64>,
    pub dest_dir: Option<String>,
}

impl ProcessedRecord {
    /// `dest_dir/basename(source_path)`, when the row knows its destination.
    pub fn dest_file(&self) -> Option<PathBuf> {
        let dest_dir = self.dest_dir.as_deref()?;
        dest_file_for(&self.source_path, dest_dir)
    }
}

/// The subset of a record needed to act on its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLocation {
    pub source_path: String,
    pub dest_dir: Option<String>,
    pub file_size: Option<i64>,
}

impl RecordLocation {
    pub fn dest_file(&self) -> Option<PathBuf> {
        let dest_dir = self.dest_dir.as_deref()?;
        dest_file_for(&self.source_path, dest_dir)
    }
}

fn dest_file_for(source_path: &str, dest_dir: &str) -> Option<PathBuf> {
    let name = Path::new(source_path).file_name()?;
    Some(Path::new(dest_dir).join(name))
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record for the same (tenant, path) already existed; nothing changed.
    Duplicate,
}

/// Listing filter and pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub tenant: Option<String>,
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl RecordQuery {
    pub fn new(tenant: Option<String>, page: i64, page_size: i64) -> Self {
        Self {
            tenant: tenant.filter(|t| !t.is_empty()),
            page,
            page_size,
        }
    }

    /// `(page - 1) * page_size`, clamped at zero.
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .max(0)
    }
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            tenant: None,
            page: 1,
            page_size: 20,
        }
    }
}
