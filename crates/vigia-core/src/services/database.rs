//! Shared database service wrapper.
//!
//! One explicitly constructed handle, opened at process start and cloned
//! into every consumer; there is no module-level connection.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    AlertRepository, AnnotationRepository, Database, SqliteAlertRepository,
    SqliteAnnotationRepository, SqliteSyncLogRepository, SyncLogRepository,
};
use crate::models::{
    Alert, AlertFilter, AlertPage, AlertStats, Annotation, AnnotationPatch, Attachment,
    AttachmentId, SyncLog,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path, creating
    /// parent directories as needed.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Upsert a batch of alerts atomically, returning the number written.
    pub async fn upsert_alerts(&self, alerts: &[Alert]) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = SqliteAlertRepository::new(db.connection());
        repo.upsert_batch(alerts)
    }

    /// Fetch a single cached alert by id.
    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let db = self.db.lock().await;
        let repo = SqliteAlertRepository::new(db.connection());
        repo.get(id)
    }

    /// Query cached alerts with filters, newest first.
    pub async fn query_alerts(
        &self,
        filter: &AlertFilter,
        limit: usize,
        offset: usize,
    ) -> Result<AlertPage> {
        let db = self.db.lock().await;
        let repo = SqliteAlertRepository::new(db.connection());
        repo.query(filter, limit, offset)
    }

    /// Aggregate counts bucketed by annotation status.
    pub async fn alert_stats(&self) -> Result<AlertStats> {
        let db = self.db.lock().await;
        let repo = SqliteAlertRepository::new(db.connection());
        repo.stats()
    }

    /// Load the annotation for an alert, if any.
    pub async fn get_annotation(&self, alert_id: &str) -> Result<Option<Annotation>> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.get(alert_id)
    }

    /// Merge-patch the annotation for an alert.
    pub async fn annotate(&self, alert_id: &str, patch: &AnnotationPatch) -> Result<Annotation> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.annotate(alert_id, patch)
    }

    /// Apply one status to many alerts, overwriting status only.
    pub async fn bulk_set_status(&self, alert_ids: &[String], status: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.bulk_set_status(alert_ids, status)
    }

    /// Store an attachment against an alert's annotation.
    pub async fn add_attachment(
        &self,
        alert_id: &str,
        file_name: &str,
        file_type: &str,
        file_size: i64,
        file_data: &str,
    ) -> Result<Attachment> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.add_attachment(alert_id, file_name, file_type, file_size, file_data)
    }

    /// List attachments for an alert, oldest first.
    pub async fn list_attachments(&self, alert_id: &str) -> Result<Vec<Attachment>> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.list_attachments(alert_id)
    }

    /// Delete an attachment by id.
    pub async fn delete_attachment(&self, id: &AttachmentId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.delete_attachment(id)
    }

    /// Sequential display number for an alert, lazily assigned.
    pub async fn sequence_number(&self, alert_id: &str) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = SqliteAnnotationRepository::new(db.connection());
        repo.sequence_number(alert_id)
    }

    /// Append a sync attempt record.
    pub async fn append_sync_log(&self, log: &SyncLog) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncLogRepository::new(db.connection());
        repo.append(log)
    }

    /// The most recent sync attempt, if any.
    pub async fn last_sync_log(&self) -> Result<Option<SyncLog>> {
        let db = self.db.lock().await;
        let repo = SqliteSyncLogRepository::new(db.connection());
        repo.last()
    }
}

#[cfg(test)]
impl DatabaseService {
    /// Test hook: run a closure against the raw connection.
    pub(crate) async fn with_connection<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> T,
    ) -> T {
        let db = self.db.lock().await;
        f(db.connection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.to_string(),
            timestamp: 1_000,
            description: "event".to_string(),
            level: 5,
            agent_name: "server-01".to_string(),
            rule_name: String::new(),
            rule_id: String::new(),
            source: String::new(),
            destination: String::new(),
            created_at: 1_000,
            updated_at: 1_000,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_upsert_and_query_roundtrip() {
        let service = DatabaseService::open_in_memory().unwrap();

        service.upsert_alerts(&[alert("a1")]).await.unwrap();
        let page = service
            .query_alerts(&AlertFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.alerts[0].alert.id, "a1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let nested = tmp.path().join("data").join("vigia.db");

        let service = DatabaseService::open_path(&nested).unwrap();
        service.upsert_alerts(&[alert("a1")]).await.unwrap();
        assert!(nested.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_the_same_store() {
        let service = DatabaseService::open_in_memory().unwrap();
        let other = service.clone();

        service.upsert_alerts(&[alert("a1")]).await.unwrap();
        assert!(other.get_alert("a1").await.unwrap().is_some());
    }
}
