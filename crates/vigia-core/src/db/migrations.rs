//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply a statement list inside one transaction, recording `version`.
fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute_batch("BEGIN")?;

    for stmt in statements {
        if let Err(e) = conn.execute_batch(stmt) {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }
    }
    if let Err(e) = conn.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        [version],
    ) {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute_batch("COMMIT") {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: sync core (alerts + sync audit trail)
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Cached alerts; id is the remote document id. Text fields
            // default to empty string so the dashboard never sees nulls.
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                timestamp INTEGER NOT NULL DEFAULT 0,
                description TEXT NOT NULL DEFAULT '',
                level INTEGER NOT NULL DEFAULT 0,
                agent_name TEXT NOT NULL DEFAULT 'unknown',
                rule_name TEXT NOT NULL DEFAULT '',
                rule_id TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT '',
                destination TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp DESC)",
            "CREATE INDEX IF NOT EXISTS idx_alerts_level ON alerts(level)",
            "CREATE INDEX IF NOT EXISTS idx_alerts_agent_name ON alerts(agent_name)",
            // Append-only audit trail of sync attempts
            "CREATE TABLE IF NOT EXISTS sync_logs (
                id TEXT PRIMARY KEY,
                last_sync INTEGER NOT NULL,
                alerts_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                error TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_logs_last_sync ON sync_logs(last_sync DESC)",
        ],
    )
}

/// Migration to version 2: triage state (annotations + attachments)
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            // The notes column is the legacy single-blob form; version 3
            // replaces it with an ordered history table.
            "CREATE TABLE IF NOT EXISTS alert_annotations (
                id TEXT PRIMARY KEY,
                alert_id TEXT NOT NULL UNIQUE REFERENCES alerts(id) ON DELETE CASCADE,
                status TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                assigned_to TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alert_annotations_alert_id
                ON alert_annotations(alert_id)",
            "CREATE INDEX IF NOT EXISTS idx_alert_annotations_status
                ON alert_annotations(status)",
            "CREATE TABLE IF NOT EXISTS attachments (
                id TEXT PRIMARY KEY,
                annotation_id TEXT NOT NULL
                    REFERENCES alert_annotations(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                file_data TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_attachments_annotation_id
                ON attachments(annotation_id)",
        ],
    )
}

/// Migration to version 3: ordered note history + sequential display numbers
fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        3,
        &[
            "CREATE TABLE IF NOT EXISTS annotation_notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                annotation_id TEXT NOT NULL
                    REFERENCES alert_annotations(id) ON DELETE CASCADE,
                body TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_annotation_notes_annotation_id
                ON annotation_notes(annotation_id)",
            // Carry any legacy single-blob notes over as one history row each
            "INSERT INTO annotation_notes (annotation_id, body, author, created_at)
                SELECT id, notes, assigned_to, updated_at
                FROM alert_annotations
                WHERE notes <> ''",
            "UPDATE alert_annotations SET notes = ''",
            // Sequential display numbers; AUTOINCREMENT keeps them monotonic
            // and never reused even after cascade deletes
            "CREATE TABLE IF NOT EXISTS alert_registry (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_id TEXT NOT NULL UNIQUE REFERENCES alerts(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL
            )",
        ],
    )
}
