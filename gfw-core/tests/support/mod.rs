#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gfw_core::{
    RecordRepository, SqliteRecordStore, StabilityPolicy, WatcherOptions,
};
use tempfile::TempDir;

pub struct StoreFixture {
    pub dir: TempDir,
    pub store: Arc<SqliteRecordStore>,
}

impl StoreFixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteRecordStore::open(&dir.path().join("filewatcher.db"))
            .await
            .expect("open record store");
        Self {
            dir,
            store: Arc::new(store),
        }
    }

    pub fn repo(&self) -> Arc<dyn RecordRepository> {
        self.store.clone()
    }
}

pub fn fast_stability() -> StabilityPolicy {
    StabilityPolicy {
        poll_interval: Duration::from_millis(20),
        stable_for: Duration::from_millis(60),
        max_wait: Duration::from_secs(5),
    }
}

pub fn fast_options(keep_source: bool) -> WatcherOptions {
    WatcherOptions {
        keep_source,
        stability: fast_stability(),
        ..WatcherOptions::default()
    }
}

pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Poll `check` until it returns true or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    while started.elapsed() < limit {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}

/// Whether the current process bypasses directory permissions (root).
#[cfg(unix)]
pub fn ignores_permissions(dir: &Path) -> bool {
    std::fs::write(dir.join(".canary"), b"").is_ok()
}
