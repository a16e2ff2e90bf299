//! Annotation repository: triage state keyed by alert id

use crate::error::{Error, Result};
use crate::models::{
    Annotation, AnnotationId, AnnotationNote, AnnotationPatch, Attachment, AttachmentId,
    ANONYMOUS_AUTHOR,
};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for annotation storage operations.
///
/// Annotation rows are created lazily on the first status, note, or
/// attachment write; the sync path never creates them.
pub trait AnnotationRepository {
    /// Load the full annotation (notes + attachments) for an alert
    fn get(&self, alert_id: &str) -> Result<Option<Annotation>>;

    /// Merge-patch the annotation for an alert, creating it if needed.
    /// Notes append to the history, they never replace it.
    fn annotate(&self, alert_id: &str, patch: &AnnotationPatch) -> Result<Annotation>;

    /// Apply the same status to every given alert id in one transaction,
    /// overwriting `status` only. Ids with no cached alert are skipped;
    /// returns the number of annotations written.
    fn bulk_set_status(&self, alert_ids: &[String], status: &str) -> Result<usize>;

    /// Store an attachment against an alert's annotation, creating the
    /// annotation if needed
    fn add_attachment(
        &self,
        alert_id: &str,
        file_name: &str,
        file_type: &str,
        file_size: i64,
        file_data: &str,
    ) -> Result<Attachment>;

    /// List attachments for an alert, oldest first
    fn list_attachments(&self, alert_id: &str) -> Result<Vec<Attachment>>;

    /// Delete an attachment by id
    fn delete_attachment(&self, id: &AttachmentId) -> Result<()>;

    /// Sequential display number for an alert, lazily assigned on first call
    fn sequence_number(&self, alert_id: &str) -> Result<i64>;

    /// Read the display number without assigning one
    fn peek_sequence(&self, alert_id: &str) -> Result<Option<i64>>;
}

/// SQLite implementation of `AnnotationRepository`
pub struct SqliteAnnotationRepository<'a> {
    conn: &'a Connection,
}

/// Bare annotation row, before notes and attachments are loaded
struct AnnotationRow {
    id: AnnotationId,
    alert_id: String,
    status: String,
    assigned_to: String,
    created_at: i64,
    updated_at: i64,
}

impl<'a> SqliteAnnotationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn alert_exists(&self, alert_id: &str) -> Result<bool> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM alerts WHERE id = ?", [alert_id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(exists.is_some())
    }

    fn row_for(&self, alert_id: &str) -> Result<Option<AnnotationRow>> {
        self.conn
            .query_row(
                "SELECT id, alert_id, status, assigned_to, created_at, updated_at
                 FROM alert_annotations
                 WHERE alert_id = ?",
                [alert_id],
                Self::parse_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Get or create the annotation row for an alert. Fails with `NotFound`
    /// when no such alert is cached.
    fn get_or_create_row(&self, alert_id: &str) -> Result<AnnotationRow> {
        if let Some(row) = self.row_for(alert_id)? {
            return Ok(row);
        }

        if !self.alert_exists(alert_id)? {
            return Err(Error::NotFound(format!("alert {alert_id}")));
        }

        let id = AnnotationId::new();
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO alert_annotations (id, alert_id, status, assigned_to, created_at, updated_at)
             VALUES (?, ?, '', '', ?, ?)",
            params![id.as_str(), alert_id, now, now],
        )?;

        Ok(AnnotationRow {
            id,
            alert_id: alert_id.to_string(),
            status: String::new(),
            assigned_to: String::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn notes_for(&self, annotation_id: &AnnotationId) -> Result<Vec<AnnotationNote>> {
        let mut stmt = self.conn.prepare(
            "SELECT body, author, created_at
             FROM annotation_notes
             WHERE annotation_id = ?
             ORDER BY id ASC",
        )?;

        let notes = stmt
            .query_map([annotation_id.as_str()], |row| {
                Ok(AnnotationNote {
                    text: row.get(0)?,
                    author: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(notes)
    }

    fn attachments_for(&self, annotation_id: &AnnotationId) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, annotation_id, file_name, file_type, file_size, file_data, created_at
             FROM attachments
             WHERE annotation_id = ?
             ORDER BY created_at ASC, id ASC",
        )?;

        let attachments = stmt
            .query_map([annotation_id.as_str()], Self::parse_attachment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(attachments)
    }

    fn load(&self, row: AnnotationRow) -> Result<Annotation> {
        let notes = self.notes_for(&row.id)?;
        let attachments = self.attachments_for(&row.id)?;
        Ok(Annotation {
            id: row.id,
            alert_id: row.alert_id,
            status: row.status,
            notes,
            assigned_to: row.assigned_to,
            attachments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnnotationRow> {
        let id: String = row.get(0)?;
        Ok(AnnotationRow {
            id: id.parse().unwrap_or_default(),
            alert_id: row.get(1)?,
            status: row.get(2)?,
            assigned_to: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn parse_attachment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
        let id: String = row.get(0)?;
        let annotation_id: String = row.get(1)?;
        Ok(Attachment {
            id: id.parse().unwrap_or_default(),
            annotation_id: annotation_id.parse().unwrap_or_default(),
            file_name: row.get(2)?,
            file_type: row.get(3)?,
            file_size: row.get(4)?,
            file_data: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl AnnotationRepository for SqliteAnnotationRepository<'_> {
    fn get(&self, alert_id: &str) -> Result<Option<Annotation>> {
        match self.row_for(alert_id)? {
            Some(row) => self.load(row).map(Some),
            None => Ok(None),
        }
    }

    fn annotate(&self, alert_id: &str, patch: &AnnotationPatch) -> Result<Annotation> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let result: Result<()> = (|| {
            let row = self.get_or_create_row(alert_id)?;
            let now = chrono::Utc::now().timestamp_millis();

            let status = patch.status.clone().unwrap_or(row.status);
            let assigned_to = patch.assigned_to.clone().unwrap_or(row.assigned_to);

            self.conn.execute(
                "UPDATE alert_annotations SET status = ?, assigned_to = ?, updated_at = ?
                 WHERE id = ?",
                params![status, assigned_to, now, row.id.as_str()],
            )?;

            if let Some(text) = patch.note.as_deref().map(str::trim) {
                if !text.is_empty() {
                    let author = if assigned_to.is_empty() {
                        ANONYMOUS_AUTHOR
                    } else {
                        assigned_to.as_str()
                    };
                    self.conn.execute(
                        "INSERT INTO annotation_notes (annotation_id, body, author, created_at)
                         VALUES (?, ?, ?, ?)",
                        params![row.id.as_str(), text, author, now],
                    )?;
                }
            }

            Ok(())
        })();

        if let Err(e) = result {
            self.conn.execute_batch("ROLLBACK").ok();
            return Err(e);
        }
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            self.conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }

        self.get(alert_id)?
            .ok_or_else(|| Error::NotFound(format!("alert {alert_id}")))
    }

    fn bulk_set_status(&self, alert_ids: &[String], status: &str) -> Result<usize> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let mut updated = 0_usize;
        for alert_id in alert_ids {
            let result: Result<bool> = (|| {
                if !self.alert_exists(alert_id)? {
                    return Ok(false);
                }
                let row = self.get_or_create_row(alert_id)?;
                let now = chrono::Utc::now().timestamp_millis();
                self.conn.execute(
                    "UPDATE alert_annotations SET status = ?, updated_at = ? WHERE id = ?",
                    params![status, now, row.id.as_str()],
                )?;
                Ok(true)
            })();

            match result {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => {
                    self.conn.execute_batch("ROLLBACK").ok();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.conn.execute_batch("COMMIT") {
            self.conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }

        Ok(updated)
    }

    fn add_attachment(
        &self,
        alert_id: &str,
        file_name: &str,
        file_type: &str,
        file_size: i64,
        file_data: &str,
    ) -> Result<Attachment> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let result: Result<Attachment> = (|| {
            let row = self.get_or_create_row(alert_id)?;
            let attachment = Attachment::new(row.id, file_name, file_type, file_size, file_data)?;

            self.conn.execute(
                "INSERT INTO attachments
                    (id, annotation_id, file_name, file_type, file_size, file_data, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    attachment.id.as_str(),
                    attachment.annotation_id.as_str(),
                    attachment.file_name,
                    attachment.file_type,
                    attachment.file_size,
                    attachment.file_data,
                    attachment.created_at,
                ],
            )?;
            Ok(attachment)
        })();

        match result {
            Ok(attachment) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    self.conn.execute_batch("ROLLBACK").ok();
                    return Err(e.into());
                }
                Ok(attachment)
            }
            Err(e) => {
                self.conn.execute_batch("ROLLBACK").ok();
                Err(e)
            }
        }
    }

    fn list_attachments(&self, alert_id: &str) -> Result<Vec<Attachment>> {
        match self.row_for(alert_id)? {
            Some(row) => self.attachments_for(&row.id),
            None => Ok(Vec::new()),
        }
    }

    fn delete_attachment(&self, id: &AttachmentId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM attachments WHERE id = ?", [id.as_str()])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("attachment {id}")));
        }

        Ok(())
    }

    fn sequence_number(&self, alert_id: &str) -> Result<i64> {
        if let Some(seq) = self.peek_sequence(alert_id)? {
            return Ok(seq);
        }

        if !self.alert_exists(alert_id)? {
            return Err(Error::NotFound(format!("alert {alert_id}")));
        }

        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO alert_registry (alert_id, created_at) VALUES (?, ?)",
            params![alert_id, now],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn peek_sequence(&self, alert_id: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT seq FROM alert_registry WHERE alert_id = ?",
                [alert_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }
}
