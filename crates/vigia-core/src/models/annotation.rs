//! Annotation model: operator triage state attached to an alert

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::attachment::Attachment;

/// Triage status vocabulary.
///
/// Statuses are free strings for forward compatibility with the dashboard,
/// but these are the values the UI and the stats buckets know about. An
/// empty status means the alert is new and unhandled.
pub mod status {
    pub const IN_PROGRESS: &str = "em atendimento";
    pub const SCHEDULED: &str = "agendado";
    pub const CLOSED: &str = "fechado";
    pub const CANCELED: &str = "cancelado";
    pub const FALSE_POSITIVE: &str = "falso-positivo";
    pub const IN_HOMOLOGATION: &str = "em homologação";

    /// All recognized non-empty statuses
    pub const ALL: [&str; 6] = [
        IN_PROGRESS,
        SCHEDULED,
        CLOSED,
        CANCELED,
        FALSE_POSITIVE,
        IN_HOMOLOGATION,
    ];
}

/// Default note author when no assignee is known
pub const ANONYMOUS_AUTHOR: &str = "anonimo";

/// A unique identifier for an annotation, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationId(Uuid);

impl AnnotationId {
    /// Create a new unique annotation ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for AnnotationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnnotationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One entry in an annotation's ordered note history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationNote {
    /// Note text
    pub text: String,
    /// Author, empty when unknown
    pub author: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

/// Operator triage state for a single alert.
///
/// Created lazily on the first status, note, or attachment write; the sync
/// path never creates one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier
    pub id: AnnotationId,
    /// The annotated alert
    pub alert_id: String,
    /// Triage status, empty for new alerts
    pub status: String,
    /// Ordered note history, oldest first
    pub notes: Vec<AnnotationNote>,
    /// Assigned operator, empty when unassigned
    pub assigned_to: String,
    /// Attachments uploaded against this annotation
    pub attachments: Vec<Attachment>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

/// Merge-patch for an annotation.
///
/// Absent fields leave the stored value untouched; `note` appends to the
/// history rather than replacing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnnotationPatch {
    /// New status, overwritten when present
    pub status: Option<String>,
    /// New assignee, overwritten when present
    #[serde(alias = "assignedTo")]
    pub assigned_to: Option<String>,
    /// Note text to append; blank text is ignored
    pub note: Option<String>,
}

impl AnnotationPatch {
    /// Whether the patch changes anything at all
    pub fn is_noop(&self) -> bool {
        self.status.is_none()
            && self.assigned_to.is_none()
            && self.note.as_deref().map_or(true, |n| n.trim().is_empty())
    }
}
