//! Alert model and query shapes

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;

/// A security alert cached from the remote index.
///
/// The `id` is the remote document identifier and is immutable once created;
/// a later sync for the same id overwrites every scalar field (last-write-wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Remote document id (Elasticsearch `_id`)
    pub id: String,
    /// When the alert was raised (Unix ms)
    pub timestamp: i64,
    /// Rule description
    pub description: String,
    /// Integer severity level
    pub level: i64,
    /// Reporting agent name
    pub agent_name: String,
    /// Matched rule name
    pub rule_name: String,
    /// Matched rule id
    pub rule_id: String,
    /// Source address, empty when the record carries none
    pub source: String,
    /// Destination address, empty when the record carries none
    pub destination: String,
    /// First time this row was written (Unix ms)
    pub created_at: i64,
    /// Refreshed on every sync pass touching this id (Unix ms)
    pub updated_at: i64,
}

/// Conjunctive filters for querying cached alerts.
///
/// Absent fields are omitted from the predicate entirely, they are not
/// matched against defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    /// Exact severity level match
    pub level: Option<i64>,
    /// Case-insensitive substring match on agent name
    pub agent: Option<String>,
    /// Case-insensitive substring match on description
    pub search: Option<String>,
    /// Inclusive lower timestamp bound (Unix ms)
    pub since_ms: Option<i64>,
    /// Inclusive upper timestamp bound (Unix ms)
    pub until_ms: Option<i64>,
}

impl AlertFilter {
    /// Whether any predicate is set
    pub const fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.agent.is_none()
            && self.search.is_none()
            && self.since_ms.is_none()
            && self.until_ms.is_none()
    }
}

/// An alert joined with its triage state, as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertWithAnnotation {
    pub alert: Alert,
    /// Present only once an operator has annotated the alert
    pub annotation: Option<Annotation>,
    /// Sequential display number, present once assigned
    pub seq: Option<i64>,
}

/// One page of query results plus the filtered total for pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<AlertWithAnnotation>,
    pub total: u64,
}

/// Aggregate counts over the cached alerts, bucketed by annotation status.
///
/// `new_alerts` is derived: alerts with no annotation status count as new.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    pub total: u64,
    pub new_alerts: u64,
    pub in_progress: u64,
    pub scheduled: u64,
    pub closed: u64,
    pub canceled: u64,
    pub false_positive: u64,
    pub in_homologation: u64,
}
