use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use tracing::{debug, info};

use crate::database::ports::RecordRepository;
use crate::error::{IngestError, Result};
use crate::types::{
    InsertOutcome, ProcessedRecord, RecordId, RecordLocation, RecordQuery,
};

const PROCESSED_FILES: &str = "processed_files";

const CREATE_PROCESSED_FILES: &str = r#"
CREATE TABLE IF NOT EXISTS processed_files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant TEXT,
    file TEXT,
    processed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    file_size INTEGER,
    dest_dir TEXT,
    UNIQUE(tenant, file)
)
"#;

/// Columns added after the first schema revision. Older databases gain them
/// as nullable columns; existing rows are left untouched.
const ADDED_COLUMNS: &[(&str, &str)] =
    &[("file_size", "INTEGER"), ("dest_dir", "TEXT")];

/// SQLite-backed record store shared by every tenant watcher.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("connections", &self.pool.size())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

#[derive(sqlx::FromRow)]
struct ProcessedRow {
    id: i64,
    tenant: String,
    file: String,
    processed_at: NaiveDateTime,
    file_size: Option<i64>,
    dest_dir: Option<String>,
}

impl From<ProcessedRow> for ProcessedRecord {
    fn from(row: ProcessedRow) -> Self {
        Self {
            id: row.id,
            tenant: row.tenant,
            source_path: row.file,
            processed_at: row.processed_at.and_utc(),
            file_size: row.file_size,
            dest_dir: row.dest_dir,
        }
    }
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database file at `path` and bring its
    /// schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!(path = %path.display(), "record store ready");
        Ok(store)
    }

    /// Private in-memory database, mostly useful for tests. The pool pins a
    /// single connection because every SQLite memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(CREATE_PROCESSED_FILES)
            .execute(&self.pool)
            .await?;

        let existing = self.columns(PROCESSED_FILES).await?;
        for (column, sql_type) in ADDED_COLUMNS {
            if existing.iter().any(|name| name == column) {
                continue;
            }
            sqlx::query(&format!(
                "ALTER TABLE {PROCESSED_FILES} ADD COLUMN {column} {sql_type}"
            ))
            .execute(&self.pool)
            .await?;
            info!(table = PROCESSED_FILES, column, "added missing column");
        }
        Ok(())
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT name FROM pragma_table_info('{table}')"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

#[async_trait]
impl RecordRepository for SqliteRecordStore {
    async fn exists(&self, tenant: &str, source_path: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM processed_files WHERE tenant = ? AND file = ?",
        )
        .bind(tenant)
        .bind(source_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn insert(
        &self,
        tenant: &str,
        source_path: &str,
        file_size: i64,
        dest_dir: &str,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO processed_files (tenant, file, file_size, dest_dir)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(tenant)
        .bind(source_path)
        .bind(file_size)
        .bind(dest_dir)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(tenant, path = source_path, "record already present");
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn delete_by_id(&self, tenant: &str, id: RecordId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM processed_files WHERE id = ? AND tenant = ?",
        )
        .bind(id)
        .bind(tenant)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<ProcessedRecord>> {
        if query.page_size < 0 {
            return Err(IngestError::InvalidInput(format!(
                "page size must not be negative (got {})",
                query.page_size
            )));
        }

        let rows: Vec<ProcessedRow> = match query.tenant.as_deref() {
            Some(tenant) => {
                sqlx::query_as(
                    r#"
                    SELECT id, tenant, file, processed_at, file_size, dest_dir
                    FROM processed_files
                    WHERE tenant = ?
                    ORDER BY processed_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(tenant)
                .bind(query.page_size)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, tenant, file, processed_at, file_size, dest_dir
                    FROM processed_files
                    ORDER BY processed_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(query.page_size)
                .bind(query.offset())
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(ProcessedRecord::from).collect())
    }

    async fn lookup_by_id(
        &self,
        tenant: &str,
        id: RecordId,
    ) -> Result<Option<RecordLocation>> {
        let row: Option<(String, Option<String>, Option<i64>)> =
            sqlx::query_as(
                r#"
                SELECT file, dest_dir, file_size
                FROM processed_files
                WHERE id = ? AND tenant = ?
                "#,
            )
            .bind(id)
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(source_path, dest_dir, file_size)| RecordLocation {
            source_path,
            dest_dir,
            file_size,
        }))
    }
}
