//! Per-tenant ingestion loop.
//!
//! Each creation event walks the file through
//! `Unseen -> Stabilizing -> Copying -> Recorded -> (SourceRemoved)`. Every
//! per-file failure is logged with tenant and path context and the loop moves
//! on; nothing that happens to a single file stops the watcher.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::database::RecordRepository;
use crate::error::{IngestError, Result};
use crate::fs::{StabilityDetector, StabilityPolicy, copy_file, is_regular_file};
use crate::types::{InsertOutcome, TenantConfig};

use super::{WatchMessage, arrivals, init_watcher};

/// Knobs shared by every tenant watcher.
#[derive(Clone, Debug)]
pub struct WatcherOptions {
    /// Leave the source in place after a successful copy.
    pub keep_source: bool,
    pub stability: StabilityPolicy,
    /// Capacity of the notify -> event loop channel.
    pub channel_capacity: usize,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            keep_source: false,
            stability: StabilityPolicy::default(),
            channel_capacity: 1024,
        }
    }
}

/// What happened to one file handed to [`TenantWatcher::process_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// A record already exists for the path.
    AlreadyProcessed,
    /// The path is missing or is a directory.
    NotAFile,
    /// The record store could not answer the dedup check.
    StoreUnavailable,
    /// Stabilization timed out or the file vanished while polling.
    Unstable,
    /// Copy failed; no record was written.
    CopyFailed { permission_denied: bool },
    Copied {
        bytes: u64,
        /// False when the record insert failed after the copy.
        recorded: bool,
        source_removed: bool,
    },
    /// Shutdown arrived while the file was stabilizing.
    Cancelled,
}

/// Watches one tenant's directory and ingests newly created files.
pub struct TenantWatcher {
    tenant: TenantConfig,
    store: Arc<dyn RecordRepository>,
    detector: StabilityDetector,
    keep_source: bool,
    rx: mpsc::Receiver<WatchMessage>,
    // Dropping the notify handle ends the OS subscription.
    _watcher: Option<RecommendedWatcher>,
}

impl fmt::Debug for TenantWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantWatcher")
            .field("tenant", &self.tenant.name)
            .field("watch_dir", &self.tenant.watch_dir)
            .field("dest_dir", &self.tenant.dest_dir)
            .field("keep_source", &self.keep_source)
            .field("subscribed", &self._watcher.is_some())
            .finish()
    }
}

impl TenantWatcher {
    /// Subscribe to creation events in the tenant's watch directory.
    ///
    /// Fails when the watch directory does not exist or the OS watcher cannot
    /// be attached; both are startup errors.
    pub fn start(
        tenant: TenantConfig,
        store: Arc<dyn RecordRepository>,
        options: &WatcherOptions,
    ) -> Result<Self> {
        match std::fs::metadata(&tenant.watch_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(IngestError::InvalidInput(format!(
                    "watch dir for tenant {} is not a directory: {}",
                    tenant.name,
                    tenant.watch_dir.display()
                )));
            }
            Err(err) => {
                return Err(IngestError::from_io(err, &tenant.watch_dir));
            }
        }

        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let watcher = init_watcher(&tenant.watch_dir, tx)?;

        Ok(Self {
            tenant,
            store,
            detector: StabilityDetector::new(options.stability.clone()),
            keep_source: options.keep_source,
            rx,
            _watcher: Some(watcher),
        })
    }

    /// Build a watcher fed from an externally owned channel instead of the OS.
    pub fn from_channel(
        tenant: TenantConfig,
        store: Arc<dyn RecordRepository>,
        options: &WatcherOptions,
        rx: mpsc::Receiver<WatchMessage>,
    ) -> Self {
        Self {
            tenant,
            store,
            detector: StabilityDetector::new(options.stability.clone()),
            keep_source: options.keep_source,
            rx,
            _watcher: None,
        }
    }

    pub fn tenant(&self) -> &TenantConfig {
        &self.tenant
    }

    /// Event loop: runs until `shutdown` fires or the notification channel
    /// closes. Events are handled strictly in delivery order.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let tenant = self.tenant.name.clone();
        info!(
            tenant = %tenant,
            watch_dir = %self.tenant.watch_dir.display(),
            "watching"
        );

        'events: loop {
            let msg = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!(tenant = %tenant, "shutdown requested, watcher exiting");
                    break 'events;
                }
                msg = self.rx.recv() => msg,
            };

            let Some(msg) = msg else {
                info!(tenant = %tenant, "notification channel closed, watcher exiting");
                break;
            };

            match msg {
                WatchMessage::Event(event) => {
                    for path in arrivals(&event) {
                        let outcome = self.handle_created(path, &shutdown).await;
                        if outcome == FileOutcome::Cancelled {
                            info!(
                                tenant = %tenant,
                                path = %path.display(),
                                "shutdown requested during stabilization, watcher exiting"
                            );
                            break 'events;
                        }
                    }
                }
                WatchMessage::Error(err) => {
                    warn!(tenant = %tenant, error = %err, "watcher error");
                }
            }
        }
    }

    async fn handle_created(
        &self,
        event_path: &Path,
        cancel: &CancellationToken,
    ) -> FileOutcome {
        let Some(file_name) = event_path.file_name() else {
            return FileOutcome::NotAFile;
        };
        let source = self.tenant.source_path(file_name);
        self.process_file(&source, cancel).await
    }

    /// Run one file through dedup, stabilization, copy, record and optional
    /// source removal.
    pub async fn process_file(
        &self,
        source: &Path,
        cancel: &CancellationToken,
    ) -> FileOutcome {
        let tenant = self.tenant.name.as_str();
        let Some(file_name) = source.file_name() else {
            return FileOutcome::NotAFile;
        };
        if !is_regular_file(source).await {
            debug!(tenant, path = %source.display(), "ignoring non-file entry");
            return FileOutcome::NotAFile;
        }

        let key = source.to_string_lossy();
        match self.store.exists(tenant, &key).await {
            Ok(true) => {
                debug!(tenant, path = %source.display(), "file already processed, skipping");
                return FileOutcome::AlreadyProcessed;
            }
            Ok(false) => {}
            Err(err) => {
                error!(tenant, path = %source.display(), error = %err, "error checking record store");
                return FileOutcome::StoreUnavailable;
            }
        }

        if let Err(err) = self.detector.wait_until_stable(source, cancel).await {
            if matches!(err, IngestError::Cancelled(_)) {
                return FileOutcome::Cancelled;
            }
            warn!(tenant, path = %source.display(), error = %err, "file did not stabilize");
            return FileOutcome::Unstable;
        }

        let dest = self.tenant.dest_path(file_name);
        let bytes = match copy_file(source, &dest).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(
                    tenant,
                    path = %source.display(),
                    dest = %dest.display(),
                    error = %err,
                    "failed to copy"
                );
                return FileOutcome::CopyFailed {
                    permission_denied: err.is_permission_denied(),
                };
            }
        };
        info!(tenant, path = %source.display(), dest = %dest.display(), bytes, "copied");

        let dest_dir = self.tenant.dest_dir.to_string_lossy();
        let size = i64::try_from(bytes).unwrap_or(i64::MAX);
        let recorded = match self.store.insert(tenant, &key, size, &dest_dir).await {
            Ok(InsertOutcome::Inserted) => true,
            Ok(InsertOutcome::Duplicate) => {
                debug!(tenant, path = %source.display(), "record already present after copy");
                true
            }
            Err(err) => {
                let err = IngestError::IntegrityInconsistency(format!(
                    "{} copied but not recorded: {err}",
                    source.display()
                ));
                error!(tenant, path = %source.display(), error = %err, "failed to mark file as processed");
                false
            }
        };

        let source_removed = if self.keep_source {
            info!(tenant, path = %source.display(), "source file kept");
            false
        } else {
            match tokio::fs::remove_file(source).await {
                Ok(()) => {
                    info!(tenant, path = %source.display(), "removed original file");
                    true
                }
                Err(err) => {
                    warn!(tenant, path = %source.display(), error = %err, "failed to remove original file");
                    false
                }
            }
        };

        FileOutcome::Copied {
            bytes,
            recorded,
            source_removed,
        }
    }
}
