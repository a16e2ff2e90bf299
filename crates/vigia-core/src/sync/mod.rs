//! Sync orchestrator.
//!
//! Pulls one batch from the remote index and merges it into the local cache
//! as an idempotent upsert. Every invocation that gets past the fetch stage
//! appends exactly one audit row to `sync_logs`, success or failure; a
//! failed fetch aborts before any store mutation and is not logged.

use thiserror::Error;

use crate::models::{Alert, SyncLog};
use crate::services::DatabaseService;
use crate::wazuh::{map_hit, AlertSource, FetchError, LevelFilter};

/// Default number of alerts pulled per run
pub const DEFAULT_BATCH_LIMIT: usize = 500;

/// Remote page-size ceiling; one logical query cannot return more
pub const MAX_BATCH_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote fetch failed; nothing was written and nothing was logged
    #[error("Sync fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The fetch succeeded but the local write failed; the attempt was
    /// logged as an error and the fetched count survives for the caller
    #[error("Sync store write failed: {source}")]
    Store {
        source: crate::Error,
        fetched: usize,
        total: u64,
    },
}

/// Outcome of a successful sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Alerts written to the cache (0 for a no-op run)
    pub count: usize,
    /// Total matching alerts reported by the remote index
    pub total: u64,
}

/// Pull up to `batch_limit` alerts (clamped to the remote ceiling) and merge
/// them into the cache. There is no automatic retry; callers that want one
/// re-invoke.
pub async fn run_sync<S: AlertSource>(
    source: &S,
    db: &DatabaseService,
    batch_limit: usize,
) -> Result<SyncReport, SyncError> {
    let limit = batch_limit.clamp(1, MAX_BATCH_LIMIT);
    let batch = source.fetch_batch(limit, 0, LevelFilter::Default).await?;
    let total = batch.total;

    if batch.hits.is_empty() {
        // No-op success; the audit trail still records the attempt
        append_log(db, &SyncLog::success(0), 0, total).await?;
        tracing::info!("Sync found no alerts to write (remote total {total})");
        return Ok(SyncReport { count: 0, total });
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let alerts: Vec<Alert> = batch.hits.iter().map(|hit| map_hit(hit, now_ms)).collect();

    match db.upsert_alerts(&alerts).await {
        Ok(count) => {
            let counted = i64::try_from(count).unwrap_or(i64::MAX);
            append_log(db, &SyncLog::success(counted), count, total).await?;
            tracing::info!("Synced {count} alerts (remote total {total})");
            Ok(SyncReport { count, total })
        }
        Err(err) => {
            let log = SyncLog::failure(err.to_string());
            if let Err(log_err) = db.append_sync_log(&log).await {
                tracing::error!("Failed to record sync failure: {log_err}");
            }
            tracing::error!("Sync store write failed after fetching {}: {err}", alerts.len());
            Err(SyncError::Store {
                source: err,
                fetched: alerts.len(),
                total,
            })
        }
    }
}

async fn append_log(
    db: &DatabaseService,
    log: &SyncLog,
    fetched: usize,
    total: u64,
) -> Result<(), SyncError> {
    db.append_sync_log(log).await.map_err(|err| SyncError::Store {
        source: err,
        fetched,
        total,
    })
}
