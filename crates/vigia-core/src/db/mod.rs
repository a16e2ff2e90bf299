//! Database layer for Vigia

mod alert_repository;
mod annotation_repository;
mod connection;
mod migrations;
mod sync_log_repository;

pub use alert_repository::{AlertRepository, SqliteAlertRepository};
pub use annotation_repository::{AnnotationRepository, SqliteAnnotationRepository};
pub use connection::Database;
pub use sync_log_repository::{SqliteSyncLogRepository, SyncLogRepository};
