//! Sync log repository: append-only audit trail of sync attempts

use crate::error::{Error, Result};
use crate::models::{SyncLog, SyncStatus};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for sync log operations
pub trait SyncLogRepository {
    /// Append one attempt record. Rows are never mutated afterwards.
    fn append(&self, log: &SyncLog) -> Result<()>;

    /// The most recent attempt, if any
    fn last(&self) -> Result<Option<SyncLog>>;
}

/// SQLite implementation of `SyncLogRepository`
pub struct SqliteSyncLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncLogRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncLog> {
        let id: String = row.get(0)?;
        let status: String = row.get(3)?;
        Ok(SyncLog {
            id: id.parse().unwrap_or_default(),
            last_sync: row.get(1)?,
            alerts_count: row.get(2)?,
            status: status.parse().unwrap_or(SyncStatus::Error),
            error: row.get(4)?,
        })
    }
}

impl SyncLogRepository for SqliteSyncLogRepository<'_> {
    fn append(&self, log: &SyncLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_logs (id, last_sync, alerts_count, status, error)
             VALUES (?, ?, ?, ?, ?)",
            params![
                log.id.as_str(),
                log.last_sync,
                log.alerts_count,
                log.status.as_str(),
                log.error,
            ],
        )?;
        Ok(())
    }

    fn last(&self) -> Result<Option<SyncLog>> {
        self.conn
            .query_row(
                "SELECT id, last_sync, alerts_count, status, error
                 FROM sync_logs
                 ORDER BY last_sync DESC, id DESC
                 LIMIT 1",
                [],
                Self::parse_log,
            )
            .optional()
            .map_err(Error::from)
    }
}
