//! Mapping of library errors onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use coursemap_shared::CourseMapError;

/// Handler error. Every failure is rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Failure from the query layer.
    Query(CourseMapError),
    /// Request body that could not be read as the expected JSON.
    Body { status: StatusCode, message: String },
}

impl From<CourseMapError> for ApiError {
    fn from(err: CourseMapError) -> Self {
        Self::Query(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Query(err) if err.is_not_found() => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Query(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::Body { status, message } => (status, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_404() {
        let resp = ApiError::from(CourseMapError::not_found("Course")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn storage_failure_is_500() {
        let resp = ApiError::from(CourseMapError::Storage("disk I/O error".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
