//! SQLite implementations of the storage ports
//!
//! [`SqliteRecordStore`] implements `IRecordStore` over the `expenses`
//! table. [`SqliteSyncStateRepository`] implements `ISyncStateRepository`
//! over `pending_queue` and `sync_status`.
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                      |
//! |----------------|----------|-----------------------------------------------|
//! | RecordId       | TEXT     | `.as_str()` / `RecordId::new()`               |
//! | Amount         | INTEGER  | cents via `.cents()` / `Amount::from_cents()` |
//! | bool           | INTEGER  | 0 / 1                                         |
//! | DateTime<Utc>  | TEXT     | RFC 3339 with nanoseconds, `Z` suffix         |
//! | payload bytes  | BLOB     | stored verbatim                               |
//! | SyncStatus     | TEXT     | serde_json document                           |

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};

use outlay_core::domain::{Amount, Expense, ExpenseDraft, PendingEntry, RecordId, SyncStatus};
use outlay_core::ports::{IRecordStore, ISyncStateRepository};

use crate::CacheError;

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Format a timestamp for storage
///
/// Fixed-width nanosecond precision keeps lexical and chronological order
/// identical, which `ORDER BY created_at` relies on, and round-trips
/// `Utc::now()` exactly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's own CURRENT_TIMESTAMP format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_record_id(s: String) -> Result<RecordId, CacheError> {
    RecordId::new(s).map_err(|e| CacheError::SerializationError(e.to_string()))
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Rebuild an Expense from an `expenses` row
///
/// Rows are trusted: the expense was validated when it was written, so
/// `Expense::restore` is used rather than re-running validation against the
/// current clock.
fn expense_from_row(row: &SqliteRow) -> Result<Expense, CacheError> {
    let id = parse_record_id(row.try_get("id")?)?;

    let amount_cents: i64 = row.try_get("amount_cents")?;
    let amount = u64::try_from(amount_cents)
        .map_err(|_| CacheError::SerializationError(format!("Negative amount {}", amount_cents)))
        .and_then(|cents| {
            Amount::from_cents(cents).map_err(|e| CacheError::SerializationError(e.to_string()))
        })?;

    let date = parse_datetime(&row.try_get::<String, _>("date")?)?;
    let mut draft = ExpenseDraft::new(amount, row.try_get::<String, _>("category_id")?, date)
        .with_card_payment(row.try_get::<i64, _>("is_card_payment")? != 0);
    draft.subcategory_id = row.try_get("subcategory_id")?;
    draft.note = row.try_get("note")?;

    let created_at = parse_datetime(&row.try_get::<String, _>("created_at")?)?;
    let updated_at = parse_datetime(&row.try_get::<String, _>("updated_at")?)?;

    Ok(Expense::restore(id, draft, created_at, updated_at))
}

/// Rebuild a PendingEntry from a `pending_queue` row
fn pending_entry_from_row(row: &SqliteRow) -> Result<PendingEntry, CacheError> {
    let record_id = parse_record_id(row.try_get("record_id")?)?;
    let payload: Vec<u8> = row.try_get("payload")?;
    let enqueued_at = parse_datetime(&row.try_get::<String, _>("enqueued_at")?)?;
    Ok(PendingEntry::with_timestamp(record_id, payload, enqueued_at))
}

// ============================================================================
// SqliteRecordStore
// ============================================================================

/// SQLite-backed expense store
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl IRecordStore for SqliteRecordStore {
    async fn get(&self, id: &RecordId) -> anyhow::Result<Option<Expense>> {
        let row = sqlx::query("SELECT * FROM expenses WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(expense_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query("SELECT * FROM expenses ORDER BY created_at DESC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        let expenses = rows
            .iter()
            .map(expense_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(expenses)
    }

    async fn put(&self, expense: &Expense) -> anyhow::Result<()> {
        let amount_cents = i64::try_from(expense.amount().cents())
            .map_err(|_| CacheError::SerializationError("Amount exceeds INTEGER".to_string()))?;

        sqlx::query(
            "INSERT INTO expenses \
             (id, amount_cents, category_id, subcategory_id, is_card_payment, \
              note, date, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
              amount_cents = excluded.amount_cents, \
              category_id = excluded.category_id, \
              subcategory_id = excluded.subcategory_id, \
              is_card_payment = excluded.is_card_payment, \
              note = excluded.note, \
              date = excluded.date, \
              created_at = excluded.created_at, \
              updated_at = excluded.updated_at",
        )
        .bind(expense.id().as_str())
        .bind(amount_cents)
        .bind(expense.category_id())
        .bind(expense.subcategory_id())
        .bind(i64::from(expense.is_card_payment()))
        .bind(expense.note())
        .bind(format_datetime(&expense.date()))
        .bind(format_datetime(&expense.created_at()))
        .bind(format_datetime(&expense.updated_at()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(id = %expense.id(), "Saved expense");
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(id = %id, removed = result.rows_affected(), "Deleted expense");
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// SqliteSyncStateRepository
// ============================================================================

/// SQLite-backed persistence for the pending queue and sync status
///
/// Each queue mutation is one `BEGIN IMMEDIATE` transaction that reads the
/// stored queue, edits it and rewrites it. Processes sharing the database
/// file therefore never overwrite each other's entries, and a reader never
/// observes a half-written queue.
pub struct SqliteSyncStateRepository {
    pool: SqlitePool,
}

impl SqliteSyncStateRepository {
    /// Creates a new repository with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Reads, edits and rewrites the queue on a connection inside a transaction
async fn rewrite_pending_queue(
    conn: &mut SqliteConnection,
    edit: &mut (dyn for<'v> FnMut(&'v mut Vec<PendingEntry>) -> bool + Send),
) -> anyhow::Result<Vec<PendingEntry>> {
    let rows = sqlx::query("SELECT * FROM pending_queue ORDER BY position ASC")
        .fetch_all(&mut *conn)
        .await?;
    let mut entries = rows
        .iter()
        .map(pending_entry_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    if !edit(&mut entries) {
        return Ok(entries);
    }

    sqlx::query("DELETE FROM pending_queue")
        .execute(&mut *conn)
        .await?;

    for (position, entry) in entries.iter().enumerate() {
        sqlx::query(
            "INSERT INTO pending_queue (position, record_id, payload, enqueued_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(position as i64)
        .bind(entry.record_id.as_str())
        .bind(entry.payload.as_slice())
        .bind(format_datetime(&entry.enqueued_at))
        .execute(&mut *conn)
        .await?;
    }

    tracing::trace!(entries = entries.len(), "Saved pending queue");
    Ok(entries)
}

async fn rollback(conn: &mut SqliteConnection) {
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        tracing::warn!(error = %e, "Failed to roll back pending queue transaction");
    }
}

#[async_trait::async_trait]
impl ISyncStateRepository for SqliteSyncStateRepository {
    async fn load_pending_queue(&self) -> anyhow::Result<Vec<PendingEntry>> {
        let rows = sqlx::query("SELECT * FROM pending_queue ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;

        let entries = rows
            .iter()
            .map(pending_entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn modify_pending_queue(
        &self,
        edit: &mut (dyn for<'v> FnMut(&'v mut Vec<PendingEntry>) -> bool + Send),
    ) -> anyhow::Result<Vec<PendingEntry>> {
        let mut conn = self.pool.acquire().await?;

        // IMMEDIATE takes the write lock before the read, so another process
        // cannot commit between our read and our write
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match rewrite_pending_queue(&mut conn, edit).await {
            Ok(entries) => {
                if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
                    rollback(&mut conn).await;
                    return Err(e.into());
                }
                Ok(entries)
            }
            Err(e) => {
                rollback(&mut conn).await;
                Err(e)
            }
        }
    }

    async fn load_sync_status(&self) -> anyhow::Result<Option<SyncStatus>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM sync_status WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match document {
            Some(json) => {
                let status = serde_json::from_str(&json).map_err(|e| {
                    CacheError::SerializationError(format!("Invalid sync status document: {}", e))
                })?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    async fn save_sync_status(&self, status: &SyncStatus) -> anyhow::Result<()> {
        let document = serde_json::to_string(status)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO sync_status (id, document, updated_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
              document = excluded.document, \
              updated_at = excluded.updated_at",
        )
        .bind(&document)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(state = %status.state(), "Saved sync status");
        Ok(())
    }
}
