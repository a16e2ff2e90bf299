use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// How much of a failure message is exposed as diagnostic detail
const DETAIL_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("External dependency error: {0}")]
    External(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(rename = "errorDetails")]
    error_details: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::External(message.into())
    }
}

impl From<vigia_core::Error> for AppError {
    fn from(err: vigia_core::Error) -> Self {
        match err {
            vigia_core::Error::NotFound(message) => Self::NotFound(message),
            vigia_core::Error::InvalidInput(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Truncate a diagnostic message to a safe preview length.
pub fn detail_preview(message: &str) -> String {
    message.chars().take(DETAIL_PREVIEW_CHARS).collect()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::External(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        let body = ErrorBody {
            error_details: detail_preview(&message),
            error: message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn core_errors_map_to_http_categories() {
        let not_found: AppError = vigia_core::Error::NotFound("alert x".to_string()).into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let bad: AppError = vigia_core::Error::InvalidInput("bad file".to_string()).into();
        assert!(matches!(bad, AppError::BadRequest(_)));

        let internal: AppError = vigia_core::Error::Database("locked".to_string()).into();
        assert!(matches!(internal, AppError::Internal(_)));
    }

    #[test]
    fn detail_preview_truncates() {
        let long = "x".repeat(500);
        assert_eq!(detail_preview(&long).len(), 200);
        assert_eq!(detail_preview("short"), "short");
    }
}
