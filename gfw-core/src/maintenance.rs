//! Operator batch operations over processed records: delete and recopy by id.
//!
//! Both require a tenant; every id is handled independently and failures are
//! collected in the returned [`BatchReport`] rather than aborting the batch.

use std::path::Path;

use tracing::{info, warn};

use crate::database::RecordRepository;
use crate::error::{IngestError, Result};
use crate::fs::copy_file;
use crate::types::RecordId;

/// Per-id results of a batch operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<RecordId>,
    pub failed: Vec<(RecordId, String)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, id: RecordId, err: &IngestError) {
        self.failed.push((id, err.to_string()));
    }
}

/// Parse a comma and/or whitespace separated list of record ids.
pub fn parse_ids(raw: &str) -> Result<Vec<RecordId>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            piece
                .parse::<RecordId>()
                .map_err(|_| IngestError::InvalidInput(format!("invalid ID: {piece:?}")))
        })
        .collect()
}

fn require_tenant<'a>(tenant: &'a str, operation: &str) -> Result<&'a str> {
    let tenant = tenant.trim();
    if tenant.is_empty() {
        return Err(IngestError::InvalidInput(format!(
            "tenant must be specified for {operation}"
        )));
    }
    Ok(tenant)
}

/// Delete records and their destination copies.
///
/// The row goes first; a destination file that cannot be removed afterwards
/// is reported as an integrity inconsistency for that id.
pub async fn delete_processed(
    store: &dyn RecordRepository,
    tenant: &str,
    ids: &[RecordId],
) -> Result<BatchReport> {
    let tenant = require_tenant(tenant, "delete-processed")?;
    let mut report = BatchReport::default();

    for &id in ids {
        let location = match store.lookup_by_id(tenant, id).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                let err = IngestError::NotFound(format!("record {id} for tenant {tenant}"));
                warn!(tenant, id, error = %err, "delete: failed to find record");
                report.fail(id, &err);
                continue;
            }
            Err(err) => {
                warn!(tenant, id, error = %err, "delete: failed to find record");
                report.fail(id, &err);
                continue;
            }
        };

        match store.delete_by_id(tenant, id).await {
            Ok(true) => {}
            Ok(false) => {
                let err = IngestError::NotFound(format!("record {id} for tenant {tenant}"));
                warn!(tenant, id, error = %err, "delete: record vanished before removal");
                report.fail(id, &err);
                continue;
            }
            Err(err) => {
                warn!(tenant, id, error = %err, "delete: failed to delete record");
                report.fail(id, &err);
                continue;
            }
        }

        let Some(dest_file) = location.dest_file() else {
            let err = IngestError::IntegrityInconsistency(format!(
                "record {id} deleted but has no destination to clean up"
            ));
            warn!(tenant, id, error = %err, "delete: record removed, file left alone");
            report.fail(id, &err);
            continue;
        };

        match tokio::fs::remove_file(&dest_file).await {
            Ok(()) => {
                info!(tenant, id, file = %dest_file.display(), "delete: record and file removed");
                report.succeeded.push(id);
            }
            Err(io_err) => {
                let err = IngestError::IntegrityInconsistency(format!(
                    "record {id} deleted but {} could not be removed: {io_err}",
                    dest_file.display()
                ));
                warn!(tenant, id, error = %err, "delete: failed to remove file from disk");
                report.fail(id, &err);
            }
        }
    }

    Ok(report)
}

/// Copy each record's source to `dest_dir/basename(source)` again. Records
/// are left unchanged.
pub async fn recopy_processed(
    store: &dyn RecordRepository,
    tenant: &str,
    ids: &[RecordId],
) -> Result<BatchReport> {
    let tenant = require_tenant(tenant, "recopy")?;
    let mut report = BatchReport::default();

    for &id in ids {
        let location = match store.lookup_by_id(tenant, id).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                let err = IngestError::NotFound(format!("record {id} for tenant {tenant}"));
                warn!(tenant, id, error = %err, "recopy: failed to find record");
                report.fail(id, &err);
                continue;
            }
            Err(err) => {
                warn!(tenant, id, error = %err, "recopy: failed to find record");
                report.fail(id, &err);
                continue;
            }
        };

        let Some(dest_file) = location.dest_file() else {
            let err = IngestError::InvalidInput(format!(
                "record {id} has no destination directory"
            ));
            warn!(tenant, id, error = %err, "recopy: cannot resolve destination");
            report.fail(id, &err);
            continue;
        };

        let source = Path::new(&location.source_path);
        match copy_file(source, &dest_file).await {
            Ok(bytes) => {
                info!(
                    tenant,
                    id,
                    path = %source.display(),
                    dest = %dest_file.display(),
                    bytes,
                    "recopy: copied"
                );
                report.succeeded.push(id);
            }
            Err(err) => {
                warn!(tenant, id, error = %err, "recopy: failed to copy");
                report.fail(id, &err);
            }
        }
    }

    Ok(report)
}
