//! Persistence of processing records.
//!
//! Callers depend on the [`RecordRepository`] port; [`SqliteRecordStore`] is
//! the production adapter.

pub mod ports;
pub mod sqlite;

pub use ports::RecordRepository;
pub use sqlite::SqliteRecordStore;
