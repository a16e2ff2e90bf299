//! Attachment model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::annotation::AnnotationId;

/// File extensions the dashboard accepts as evidence uploads
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["zip", "xlsx", "docx", "txt"];

/// A unique identifier for an attachment, using UUID v7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentId(Uuid);

impl AttachmentId {
    /// Create a new unique attachment ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for AttachmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttachmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Evidence file stored against an annotation.
///
/// The payload is kept inline as a base64 data URL; uploads are small
/// operator documents, not media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique attachment identifier.
    pub id: AttachmentId,
    /// Parent annotation identifier.
    pub annotation_id: AnnotationId,
    /// Original file name.
    pub file_name: String,
    /// Declared content type.
    pub file_type: String,
    /// Declared size in bytes.
    pub file_size: i64,
    /// Base64 data URL payload.
    pub file_data: String,
    /// Creation timestamp (Unix ms).
    pub created_at: i64,
}

impl Attachment {
    /// Create a new attachment record, validating name, type, size, and the
    /// extension allow-list.
    pub fn new(
        annotation_id: AnnotationId,
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        file_size: i64,
        file_data: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into().trim().to_string();
        let file_type = file_type.into().trim().to_string();
        let file_data = file_data.into();

        if file_name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file name cannot be empty".to_string(),
            ));
        }
        if file_type.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file type cannot be empty".to_string(),
            ));
        }
        if file_size < 0 {
            return Err(Error::InvalidInput(
                "Attachment file size cannot be negative".to_string(),
            ));
        }

        let extension = file_name
            .rsplit('.')
            .next()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::InvalidInput(format!(
                "Attachment extension not allowed: {file_name} (allowed: zip, xlsx, docx, txt)"
            )));
        }

        Ok(Self {
            id: AttachmentId::new(),
            annotation_id,
            file_name,
            file_type,
            file_size,
            file_data,
            created_at: chrono::Utc::now().timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_id_unique() {
        let id1 = AttachmentId::new();
        let id2 = AttachmentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_attachment_new() {
        let attachment = Attachment::new(
            AnnotationId::new(),
            "evidence.zip",
            "application/zip",
            1234,
            "data:application/zip;base64,UEsDBA==",
        )
        .unwrap();

        assert_eq!(attachment.file_name, "evidence.zip");
        assert_eq!(attachment.file_type, "application/zip");
        assert_eq!(attachment.file_size, 1234);
    }

    #[test]
    fn test_attachment_validation() {
        let annotation_id = AnnotationId::new();

        assert!(Attachment::new(annotation_id, "", "text/plain", 1, "x").is_err());
        assert!(Attachment::new(annotation_id, "notes.txt", "", 1, "x").is_err());
        assert!(Attachment::new(annotation_id, "notes.txt", "text/plain", -1, "x").is_err());
    }

    #[test]
    fn test_attachment_extension_allow_list() {
        let annotation_id = AnnotationId::new();

        assert!(Attachment::new(annotation_id, "report.XLSX", "application/xlsx", 1, "x").is_ok());
        assert!(Attachment::new(annotation_id, "payload.exe", "application/x-dos", 1, "x").is_err());
        assert!(Attachment::new(annotation_id, "noextension", "text/plain", 1, "x").is_err());
    }
}
