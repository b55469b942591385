//! Startup reconciliation between a tenant's directories and the record store.
//!
//! Files that arrived, were copied, or were placed by hand while the service
//! was down are brought into the record store so the live watcher only has to
//! deal with new creations.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::database::RecordRepository;
use crate::error::{IngestError, Result};
use crate::fs::{copy_file, is_regular_file};
use crate::types::TenantConfig;

/// Where a filename was found during the directory scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    SourceOnly,
    DestOnly,
    Both,
}

impl Presence {
    fn classify(in_source: bool, in_dest: bool) -> Option<Self> {
        match (in_source, in_dest) {
            (true, false) => Some(Presence::SourceOnly),
            (false, true) => Some(Presence::DestOnly),
            (true, true) => Some(Presence::Both),
            (false, false) => None,
        }
    }
}

/// Per-tenant tally of what reconciliation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Names whose record already existed.
    pub already_recorded: usize,
    /// Registered from the destination copy alone.
    pub registered_from_dest: usize,
    /// Copied from the watch directory, then registered.
    pub copied: usize,
    /// Present on both sides, registered without copying.
    pub registered_both: usize,
    pub failed: usize,
}

/// Reconcile one tenant. Directory read failures count as empty directories;
/// per-file failures are logged and counted, never fatal.
pub async fn reconcile_tenant(
    store: &dyn RecordRepository,
    tenant: &TenantConfig,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let mut names = list_file_names(&tenant.watch_dir).await;
    names.extend(list_file_names(&tenant.dest_dir).await);

    for name in names {
        match reconcile_file(store, tenant, &name).await {
            Ok(Some(presence)) => match presence {
                Presence::SourceOnly => report.copied += 1,
                Presence::DestOnly => report.registered_from_dest += 1,
                Presence::Both => report.registered_both += 1,
            },
            Ok(None) => report.already_recorded += 1,
            Err(err) => {
                report.failed += 1;
                error!(
                    tenant = %tenant.name,
                    file = %Path::new(&name).display(),
                    error = %err,
                    "reconciliation failed"
                );
            }
        }
    }

    info!(
        tenant = %tenant.name,
        already_recorded = report.already_recorded,
        registered_from_dest = report.registered_from_dest,
        copied = report.copied,
        registered_both = report.registered_both,
        failed = report.failed,
        "reconciliation finished"
    );
    report
}

/// Returns the action taken, or `None` when the record already existed or the
/// name is no longer a regular file on either side.
async fn reconcile_file(
    store: &dyn RecordRepository,
    tenant: &TenantConfig,
    name: &OsString,
) -> Result<Option<Presence>> {
    let source = tenant.source_path(name);
    let dest = tenant.dest_path(name);
    let key = source.to_string_lossy();

    if store.exists(&tenant.name, &key).await? {
        debug!(tenant = %tenant.name, path = %source.display(), "already recorded");
        return Ok(None);
    }

    let presence = Presence::classify(
        is_regular_file(&source).await,
        is_regular_file(&dest).await,
    );
    let Some(presence) = presence else {
        return Ok(None);
    };

    let dest_dir = tenant.dest_dir.to_string_lossy();
    match presence {
        Presence::DestOnly => {
            let size = file_size(&dest).await?;
            store.insert(&tenant.name, &key, size, &dest_dir).await?;
            info!(
                tenant = %tenant.name,
                dest = %dest.display(),
                "only in dest: registered"
            );
        }
        Presence::SourceOnly => {
            if let Err(err) = copy_file(&source, &dest).await {
                warn!(
                    tenant = %tenant.name,
                    path = %source.display(),
                    dest = %dest.display(),
                    error = %err,
                    "only in watch: copy failed, leaving unrecorded"
                );
                return Err(err);
            }
            let size = file_size(&source).await?;
            store.insert(&tenant.name, &key, size, &dest_dir).await?;
            info!(
                tenant = %tenant.name,
                path = %source.display(),
                dest = %dest.display(),
                "only in watch: copied and registered"
            );
        }
        Presence::Both => {
            let size = file_size(&source).await?;
            store.insert(&tenant.name, &key, size, &dest_dir).await?;
            info!(
                tenant = %tenant.name,
                path = %source.display(),
                "in both: registered"
            );
        }
    }

    Ok(Some(presence))
}

async fn list_file_names(dir: &Path) -> BTreeSet<OsString> {
    let mut names = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "directory unreadable, treating as empty");
            return names;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|kind| kind.is_dir())
                    .unwrap_or(false);
                if !is_dir {
                    names.insert(entry.file_name());
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "directory listing interrupted");
                break;
            }
        }
    }
    names
}

async fn file_size(path: &Path) -> Result<i64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|err| IngestError::from_io(err, path))?;
    Ok(i64::try_from(meta.len()).unwrap_or(i64::MAX))
}
