//! # GFW core
//!
//! Multi-tenant directory ingestion. For every configured tenant a watcher
//! subscribes to file creations in the tenant's watch directory, waits until
//! each new file's size settles, copies it once into the tenant's destination
//! directory, records the fact in a shared record store, and optionally
//! removes the source. At startup a reconciliation pass brings the record
//! store in line with whatever is already sitting in either directory.
//!
//! ```text
//! Supervisor ──▶ reconcile_tenant (per tenant, sequential)
//!     │
//!     └──▶ TenantWatcher (one task per tenant)
//!              notify ─▶ StabilityDetector ─▶ RecordRepository::exists
//!                     ─▶ copy_file ─▶ RecordRepository::insert ─▶ remove source
//! ```

pub mod database;
pub mod error;
pub mod fs;
pub mod maintenance;
pub mod scan;
pub mod types;

pub use database::{RecordRepository, SqliteRecordStore};
pub use error::{IngestError, Result};
pub use fs::{StabilityDetector, StabilityPolicy, copy_file};
pub use maintenance::{BatchReport, delete_processed, parse_ids, recopy_processed};
pub use scan::{
    FileOutcome, ReconcileReport, Supervisor, TenantWatcher, WatcherOptions,
    reconcile_tenant,
};
pub use types::{
    InsertOutcome, ProcessedRecord, RecordId, RecordLocation, RecordQuery,
    TenantConfig,
};
