//! Filesystem notification bridge for tenant watchers.
//!
//! A thin wrapper around `notify`: the OS watcher runs its callback on its own
//! thread, so raw events and watcher errors are forwarded into a bounded
//! tokio channel with `blocking_send` and consumed by the tenant's async
//! event loop.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{IngestError, Result};

pub mod tenant;

pub use tenant::{FileOutcome, TenantWatcher, WatcherOptions};

/// Message delivered from the notify thread to a tenant's event loop.
pub enum WatchMessage {
    Event(Event),
    Error(String),
}

impl fmt::Debug for WatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMessage::Event(event) => {
                let path_count = event.paths.len();
                f.debug_struct("WatchMessage::Event")
                    .field("kind", &event.kind)
                    .field("path_count", &path_count)
                    .finish()
            }
            WatchMessage::Error(message) => f
                .debug_struct("WatchMessage::Error")
                .field("message", message)
                .finish(),
        }
    }
}

/// Paths that newly appeared in the watched directory.
///
/// Creations and files renamed into the directory both count. A paired
/// rename carries the old path first and the new one last; unpaired
/// `RenameMode::Any` paths are passed through and filtered by the caller's
/// regular-file check. Every other kind yields nothing.
pub fn arrivals(event: &Event) -> &[PathBuf] {
    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .last()
            .map(std::slice::from_ref)
            .unwrap_or_default(),
        _ => &[],
    }
}

/// Hand one notify callback result to the event loop. Returns false, after
/// logging the dropped message, when the loop has gone away.
fn forward(
    tx: &mpsc::Sender<WatchMessage>,
    dir: &Path,
    res: std::result::Result<Event, notify::Error>,
) -> bool {
    let (what, msg) = match res {
        Ok(event) => ("event", WatchMessage::Event(event)),
        Err(err) => ("error", WatchMessage::Error(err.to_string())),
    };
    match tx.blocking_send(msg) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                "fs_watch channel send failed for {} ({}): {:?}",
                dir.display(),
                what,
                err.0
            );
            false
        }
    }
}

/// Start a non-recursive OS watcher on `dir` that forwards into `tx`.
///
/// The returned watcher must be kept alive for as long as events are wanted;
/// dropping it stops the notify stream and eventually closes the channel.
pub fn init_watcher(
    dir: &Path,
    tx: mpsc::Sender<WatchMessage>,
) -> Result<RecommendedWatcher> {
    let dir_label = dir.to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            forward(&tx, &dir_label, res);
        },
        NotifyConfig::default(),
    )
    .map_err(|err| {
        IngestError::Watch(format!(
            "failed to create watcher for {}: {}",
            dir.display(),
            err
        ))
    })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|err| {
            IngestError::Watch(format!(
                "failed to watch {}: {}",
                dir.display(),
                err
            ))
        })?;

    Ok(watcher)
}
