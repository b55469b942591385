//! Watching, reconciliation and supervision.
//!
//! `fs_watch` turns OS notifications into per-tenant ingestion, `reconcile`
//! repairs state at startup, and `supervisor` ties both to one cancellation
//! token.

pub mod fs_watch;
pub mod reconcile;
pub mod supervisor;

pub use fs_watch::{FileOutcome, TenantWatcher, WatchMessage, WatcherOptions};
pub use reconcile::{Presence, ReconcileReport, reconcile_tenant};
pub use supervisor::{Supervisor, cancel_on_signal, wait_for_shutdown_signal};
