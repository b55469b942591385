use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    InsertOutcome, ProcessedRecord, RecordId, RecordLocation, RecordQuery,
};

/// Durable mapping of (tenant, source path) to processing metadata.
///
/// Implementations must be safe to share between concurrently running tenant
/// watchers and must enforce (tenant, source path) uniqueness themselves.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// True iff a record exists for the pair.
    async fn exists(&self, tenant: &str, source_path: &str) -> Result<bool>;

    /// Create a record. A second insert for the same pair is a silent no-op
    /// reported as [`InsertOutcome::Duplicate`].
    async fn insert(
        &self,
        tenant: &str,
        source_path: &str,
        file_size: i64,
        dest_dir: &str,
    ) -> Result<InsertOutcome>;

    /// Remove the record only if it belongs to `tenant`. Returns whether a
    /// row was removed.
    async fn delete_by_id(&self, tenant: &str, id: RecordId) -> Result<bool>;

    /// Records ordered by `processed_at` descending, optionally filtered by
    /// tenant, one page at a time.
    async fn query(&self, query: &RecordQuery) -> Result<Vec<ProcessedRecord>>;

    async fn lookup_by_id(
        &self,
        tenant: &str,
        id: RecordId,
    ) -> Result<Option<RecordLocation>>;
}
