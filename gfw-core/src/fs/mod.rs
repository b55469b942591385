//! Filesystem primitives used by the ingestion pipeline.

pub mod copy;
pub mod stability;

pub use copy::copy_file;
pub use stability::{StabilityDetector, StabilityPolicy};

use std::path::Path;

/// True when `path` exists and is a regular file (symlinks followed).
/// Directories, FIFOs, sockets and device nodes are rejected.
pub async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
