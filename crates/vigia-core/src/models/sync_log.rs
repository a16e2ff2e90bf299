//! Sync attempt log model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a sync log entry, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncLogId(Uuid);

impl SyncLogId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncLogId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncLogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncLogId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Outcome of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// One append-only record of a sync attempt. Never mutated after insert;
/// only used to report last-sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLog {
    /// Unique identifier
    pub id: SyncLogId,
    /// When the attempt finished (Unix ms)
    pub last_sync: i64,
    /// Alerts written by the attempt, 0 on failure
    pub alerts_count: i64,
    /// Attempt outcome
    pub status: SyncStatus,
    /// Failure message, absent on success
    pub error: Option<String>,
}

impl SyncLog {
    /// Record a successful attempt that wrote `alerts_count` rows.
    #[must_use]
    pub fn success(alerts_count: i64) -> Self {
        Self {
            id: SyncLogId::new(),
            last_sync: chrono::Utc::now().timestamp_millis(),
            alerts_count,
            status: SyncStatus::Success,
            error: None,
        }
    }

    /// Record a failed attempt with the triggering error message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            id: SyncLogId::new(),
            last_sync: chrono::Utc::now().timestamp_millis(),
            alerts_count: 0,
            status: SyncStatus::Error,
            error: Some(message.into()),
        }
    }
}
